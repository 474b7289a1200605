pub mod google_trends;

pub use google_trends::GoogleTrendsSource;
