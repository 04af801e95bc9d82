pub mod bigquery;
pub mod google_ads;
pub mod secret_manager;
