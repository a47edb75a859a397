//! Process counters exposed at `/metrics` in the OpenMetrics text format.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LoginLabels {
    pub outcome: String,
}

pub struct Metrics {
    registry: Registry,
    pub registrations: Counter,
    pub logins: Family<LoginLabels, Counter>,
    pub messages_created: Counter,
    pub auth_denials: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let registrations = Counter::default();
        let logins = Family::<LoginLabels, Counter>::default();
        let messages_created = Counter::default();
        let auth_denials = Counter::default();

        registry.register(
            "slimchat_registrations",
            "Accounts created",
            registrations.clone(),
        );
        registry.register("slimchat_logins", "Login attempts by outcome", logins.clone());
        registry.register(
            "slimchat_messages_created",
            "Messages persisted",
            messages_created.clone(),
        );
        registry.register(
            "slimchat_auth_denials",
            "Requests rejected by the auth gate",
            auth_denials.clone(),
        );

        Self {
            registry,
            registrations,
            logins,
            messages_created,
            auth_denials,
        }
    }

    pub fn record_login(&self, outcome: &str) {
        self.logins
            .get_or_create(&LoginLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut body = String::new();
        encode(&mut body, &self.registry)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_counter() {
        let metrics = Metrics::new();
        metrics.registrations.inc();
        metrics.record_login("success");
        metrics.record_login("forbidden");

        let body = metrics.render().unwrap();
        assert!(body.contains("slimchat_registrations_total 1"));
        assert!(body.contains("slimchat_logins_total{outcome=\"success\"} 1"));
        assert!(body.contains("slimchat_messages_created_total 0"));
        assert!(body.contains("slimchat_auth_denials_total 0"));
        assert!(body.ends_with("# EOF\n"));
    }
}
