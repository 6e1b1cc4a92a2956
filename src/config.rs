use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub db_url: Option<String>,
    pub app_name: String,
    pub keycloak_ui_id: String,
    pub keycloak_url: String,
    pub keycloak_realm: String,
    pub deployment: String,
    pub admin_role: String,
    pub sample_service_addr: String,
    pub test_service_addr: String,
    pub quality_control_service_addr: String,
    pub goods_receipt_service_addr: String,
    pub warehouse_service_addr: String,
    pub remote_call_timeout_seconds: u64,
    pub tests_running: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok(); // Load from .env file if available
        let db_url = env::var("DB_URL").ok().or_else(|| {
            Some(format!(
                "{}://{}:{}@{}:{}/{}",
                env::var("DB_PREFIX").unwrap_or_else(|_| "postgresql".to_string()),
                env::var("DB_USER").expect("DB_USER must be set"),
                env::var("DB_PASSWORD").expect("DB_PASSWORD must be set"),
                env::var("DB_HOST").expect("DB_HOST must be set"),
                env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string()),
                env::var("DB_NAME").expect("DB_NAME must be set"),
            ))
        });

        Config {
            app_name: env::var("APP_NAME").expect("APP_NAME must be set"),
            keycloak_ui_id: env::var("KEYCLOAK_UI_ID").expect("KEYCLOAK_UI_ID must be set"),
            keycloak_url: env::var("KEYCLOAK_URL").expect("KEYCLOAK_URL must be set"),
            keycloak_realm: env::var("KEYCLOAK_REALM").expect("KEYCLOAK_REALM must be set"),
            deployment: env::var("DEPLOYMENT")
                .expect("DEPLOYMENT must be set, this can be local, dev, stage, or prod"),
            admin_role: "qms-admin".to_string(), // Admin role name in Keycloak
            sample_service_addr: env::var("QC_SAMPLE_SERVICE_ADDR")
                .expect("QC_SAMPLE_SERVICE_ADDR must be set"),
            test_service_addr: env::var("QC_TEST_SERVICE_ADDR")
                .expect("QC_TEST_SERVICE_ADDR must be set"),
            // Empty means the QC Results store runs in this process
            quality_control_service_addr: env::var("QUALITY_CONTROL_SERVICE_ADDR")
                .unwrap_or_default(),
            goods_receipt_service_addr: env::var("GOODS_RECEIPT_SERVICE_ADDR")
                .expect("GOODS_RECEIPT_SERVICE_ADDR must be set"),
            warehouse_service_addr: env::var("WAREHOUSE_SERVICE_ADDR")
                .expect("WAREHOUSE_SERVICE_ADDR must be set"),
            remote_call_timeout_seconds: env::var("REMOTE_CALL_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            tests_running: false,
            db_url,
        }
    }

    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_call_timeout_seconds)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            app_name: "qms-api-test".to_string(),
            keycloak_ui_id: "test-ui".to_string(),
            keycloak_url: String::new(),
            keycloak_realm: "test-realm".to_string(),
            deployment: "test".to_string(),
            admin_role: "qms-admin".to_string(),
            sample_service_addr: "127.0.0.1:0".to_string(),
            test_service_addr: "127.0.0.1:0".to_string(),
            quality_control_service_addr: String::new(),
            goods_receipt_service_addr: "127.0.0.1:0".to_string(),
            warehouse_service_addr: "127.0.0.1:0".to_string(),
            remote_call_timeout_seconds: 1,
            tests_running: true,
            db_url: None,
        }
    }
}
