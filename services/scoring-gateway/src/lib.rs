//! Sales-forecasting scoring gateway: HTTP edge over the serving core.

pub mod routes;
