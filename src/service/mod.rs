pub mod booking_service;
pub mod booking_validator;
pub mod escrow_service;
pub mod reconcile_service;
pub mod refund_policy;
pub mod wallet_service;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Settings;
use crate::notifications::NotificationManager;
use crate::payments::PaymentGateway;
use crate::repository::{SqliteUserRepository, UserRepository};

use booking_service::BookingService;
use booking_validator::BookingValidator;
use escrow_service::EscrowService;
use reconcile_service::ReconcileService;
use wallet_service::WalletService;

pub use booking_service::{calculate_price, PriceQuote};
pub use reconcile_service::{PaymentNotification, ReconcileOutcome};
pub use wallet_service::TopUpIntent;

pub struct ServiceContext {
    pub users: Arc<dyn UserRepository>,
    pub wallet_service: Arc<WalletService>,
    pub escrow_service: Arc<EscrowService>,
    pub booking_service: Arc<BookingService>,
    pub reconcile_service: Arc<ReconcileService>,
    pub notification_manager: Arc<NotificationManager>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        settings: &Settings,
        db_pool: SqlitePool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notification_manager: Arc<NotificationManager>,
    ) -> Self {
        let users: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(db_pool.clone()));

        let wallet_service = Arc::new(WalletService::new(
            db_pool.clone(),
            gateway,
            settings.payments.min_top_up,
        ));
        let escrow_service = Arc::new(EscrowService::new(
            db_pool.clone(),
            notification_manager.clone(),
        ));
        let booking_service = Arc::new(BookingService::new(
            db_pool.clone(),
            users.clone(),
            BookingValidator::new(settings.booking.clone()),
            escrow_service.clone(),
            notification_manager.clone(),
        ));
        let reconcile_service = Arc::new(ReconcileService::new(
            db_pool.clone(),
            settings.payments.clone(),
            notification_manager.clone(),
        ));

        Self {
            users,
            wallet_service,
            escrow_service,
            booking_service,
            reconcile_service,
            notification_manager,
            db_pool,
        }
    }
}
