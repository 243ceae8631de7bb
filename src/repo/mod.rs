pub mod addresses;
pub mod catalog;
pub mod orders;
pub mod users;

pub use addresses::AddressRepo;
pub use catalog::CatalogRepo;
pub use orders::OrderRepo;
pub use users::UserRepo;
