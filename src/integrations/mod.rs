//! Outbound HTTP glue: transactional email and weather forecasts.

pub mod mailer;
pub mod weather;

pub use mailer::{send_quotation, DeliveryReceipt, HttpMailer, Mailer, OutgoingEmail};
pub use weather::{is_installation_weather_ok, DailyForecast, WeatherClient};
