use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

mod awards;
mod config;
mod db;
mod error;
mod handlers;
mod lifecycle;
mod middleware;
mod models;
mod notifier;
mod payments;
mod points;
mod repo;

use awards::PointsService;
use config::Config;
use handlers::webhook::WebhookSecret;
use lifecycle::OrderLifecycle;
use middleware::AuthMiddleware;
use notifier::{LogOnlyNotifier, MailRelayNotifier, OrderNotifier};
use payments::PaymentClient;
use repo::{AddressRepo, CatalogRepo, OrderRepo, UserRepo};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env()?;

    let pool = db::get_db_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let orders = OrderRepo::new(&pool);
    let users = UserRepo::new(&pool);
    let catalog = CatalogRepo::new(&pool);
    let addresses = AddressRepo::new(&pool);

    let notifier: Arc<dyn OrderNotifier> = match &config.mail_relay_url {
        Some(url) => Arc::new(MailRelayNotifier::new(
            url.clone(),
            config.mail_from.clone(),
        )),
        None => {
            tracing::warn!("MAIL_RELAY_URL not set; notifications will be logged only");
            Arc::new(LogOnlyNotifier)
        }
    };

    let payment_client = PaymentClient::new(
        config.payment_api_base.clone(),
        config.payment_secret_key.clone(),
    );
    let points = PointsService::new(users.clone(), orders.clone());
    let lifecycle = OrderLifecycle::new(
        pool.clone(),
        orders,
        users,
        catalog,
        addresses,
        points.clone(),
        payment_client,
        notifier,
    );

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("GreenCart backend running at http://{addr}");

    let jwt_secret = config.jwt_secret.clone();
    let webhook_secret = config.payment_webhook_secret.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(lifecycle.clone()))
            .app_data(web::Data::new(points.clone()))
            .app_data(web::Data::new(WebhookSecret(webhook_secret.clone())))
            .service(handlers::webhook::payment_webhook)
            .service(
                web::scope("/api/order")
                    .wrap(AuthMiddleware::new(jwt_secret.clone()))
                    .service(handlers::orders::place_order_cod)
                    .service(handlers::orders::place_order_stripe)
                    .service(handlers::orders::update_status)
                    .service(handlers::orders::get_tracking)
                    .service(handlers::orders::request_return)
                    .service(handlers::orders::cancel_order)
                    .service(handlers::orders::get_user_orders)
                    .service(handlers::orders::get_all_orders),
            )
            .service(
                web::scope("/api/points")
                    .wrap(AuthMiddleware::new(jwt_secret.clone()))
                    .service(handlers::points::get_user_points)
                    .service(handlers::points::get_points_history)
                    .service(handlers::points::get_redemption_options)
                    .service(handlers::points::redeem_points),
            )
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
