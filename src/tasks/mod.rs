pub mod load;
pub mod stats_reporter;
