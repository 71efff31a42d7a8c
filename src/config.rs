use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub server_host: String,
    pub server_port: u16,
    pub fare: FareConfig,
    pub payment: PaymentConfig,
    pub routing: RoutingConfig,
    pub mail: MailConfig,
}

/// Fare-cap parameters: `max_fare = round_to_step(base + km * rate, step)`.
#[derive(Clone, Copy)]
pub struct FareConfig {
    pub base_fare: f64,
    pub rate_per_km: f64,
    pub round_step: f64,
}

/// Tax/fee rates are explicit configuration handed to the payment
/// orchestrator, not ambient statics.
#[derive(Clone)]
pub struct PaymentConfig {
    pub gst_rate: f64,
    pub platform_fee_rate: f64,
    pub razorpay_key_id: Option<String>,
    pub razorpay_key_secret: Option<String>,
}

#[derive(Clone)]
pub struct RoutingConfig {
    pub nominatim_url: String,
    pub osrm_url: String,
}

#[derive(Clone)]
pub struct MailConfig {
    pub relay_url: Option<String>,
    pub relay_api_key: Option<String>,
    pub from_address: String,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_f64_or(key: &str, default: f64) -> f64 {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a number", key)),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a number"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            fare: FareConfig {
                base_fare: env_f64_or("BASE_FARE", 50.0),
                rate_per_km: env_f64_or("RATE_PER_KM", 5.0),
                round_step: env_f64_or("FARE_ROUND_STEP", 10.0),
            },
            payment: PaymentConfig {
                gst_rate: env_f64_or("GST_RATE", 0.05),
                platform_fee_rate: env_f64_or("PLATFORM_FEE_RATE", 0.02),
                razorpay_key_id: env_opt("RAZORPAY_KEY_ID"),
                razorpay_key_secret: env_opt("RAZORPAY_KEY_SECRET"),
            },
            routing: RoutingConfig {
                nominatim_url: env::var("NOMINATIM_URL")
                    .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
                osrm_url: env::var("OSRM_URL")
                    .unwrap_or_else(|_| "https://router.project-osrm.org".to_string()),
            },
            mail: MailConfig {
                relay_url: env_opt("MAIL_RELAY_URL"),
                relay_api_key: env_opt("MAIL_RELAY_API_KEY"),
                from_address: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "noreply@rideshare.local".to_string()),
            },
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            base_fare: 50.0,
            rate_per_km: 5.0,
            round_step: 10.0,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gst_rate: 0.05,
            platform_fee_rate: 0.02,
            razorpay_key_id: None,
            razorpay_key_secret: None,
        }
    }
}
