pub mod diagnosis;
pub mod health;
pub mod photo_analysis;
pub mod reports;
