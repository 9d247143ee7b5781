//! Feedforward API Library
//!
//! Backend for the Feedforward project-feedback application: rating
//! aggregation, Stripe subscription reconciliation, reviewer sessions,
//! navigation decisions, form validation, image uploads and link previews.
//!
//! # Modules
//!
//! - `api`: HTTP-facing handlers and routes.
//! - `core`: Domain logic and shared errors/models.
//! - `integrations`: External service clients and wire models.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `forms`: Project form validation.
//! - `handlers`: HTTP request handlers and shared state.
//! - `link_preview`: OpenGraph metadata extraction.
//! - `models`: Core data models.
//! - `project_storage`: Project and feedback reads.
//! - `rating`: Per-criterion rating aggregation.
//! - `reconciler`: Subscription state reconciliation.
//! - `route_guard`: Page navigation decision table.
//! - `routes`: Router assembly.
//! - `session`: Reviewer session tokens and feedback claims.
//! - `session_handler`: Session and claim endpoints.
//! - `signature`: Stripe webhook signature verification.
//! - `stripe_client`: Stripe REST client.
//! - `stripe_models`: Stripe wire models.
//! - `subscription_store`: Subscription persistence.
//! - `uploads`: Image upload policy and storage client.
//! - `webhook_handler`: Stripe webhook endpoint.

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod db;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod link_preview;
pub mod models;
pub mod project_storage;
pub mod rating;
pub mod reconciler;
pub mod route_guard;
pub mod routes;
pub mod session;
pub mod session_handler;
pub mod signature;
pub mod stripe_client;
pub mod stripe_models;
pub mod subscription_store;
pub mod uploads;
pub mod webhook_handler;
