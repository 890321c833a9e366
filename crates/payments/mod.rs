pub mod formatting;
pub mod paylink_client;
pub mod response_shapes;
pub mod token_cache;
