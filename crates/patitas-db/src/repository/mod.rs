//! # Repository Layer
//!
//! One repository per aggregate. Pool-backed methods serve plain reads;
//! `*_in_tx` associated functions participate in engine transactions by
//! borrowing the caller's connection.

pub mod customer;
pub mod product;
pub mod sale;
pub mod service;

pub use customer::CustomerRepository;
pub use product::ProductRepository;
pub use sale::{ReturnedQuantity, SaleRepository};
pub use service::ServiceRepository;
