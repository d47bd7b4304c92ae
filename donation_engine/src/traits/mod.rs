mod donation_gateway_database;

pub use donation_gateway_database::{DonationGatewayDatabase, DonationGatewayError};
