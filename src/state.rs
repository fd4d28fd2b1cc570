use crate::{
    db::{DbPool, OrmConn},
    gateway::PaymentGateway,
    mailer::Mailer,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub mailer: Mailer,
    pub gateway: PaymentGateway,
    pub public_base_url: String,
}
