use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Treat weekly and monthly bookings as able to collide.
    pub strict_cross_cycle: bool,
    /// Longest date range a calendar request may cover.
    pub max_calendar_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "roombook.db".to_string()),
            strict_cross_cycle: env::var("STRICT_CROSS_CYCLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            max_calendar_days: env::var("MAX_CALENDAR_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|d: &i64| *d > 0)
                .unwrap_or(366),
        }
    }
}
