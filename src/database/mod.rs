pub mod address_book;
pub mod connection;
pub mod repository;
