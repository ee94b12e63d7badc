pub mod notifier;
pub mod provider;

pub use notifier::{HttpNotifier, MailerConfig, Notifier, WhatsAppConfig};
pub use provider::{InitializeRequest, PaymentProvider, PaystackClient, ProviderSession};
