use crate::{bool_label, ResourceCollector, UNKNOWN};
use async_trait::async_trait;
use nbmon_api::{NetBirdClient, User};
use prometheus::core::Collector as PromCollector;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collector for `GET /api/users`.
pub struct UsersCollector {
    client: Arc<NetBirdClient>,
    cycle: Mutex<()>,

    total: IntGaugeVec,
    by_role: IntGaugeVec,
    by_status: IntGaugeVec,
    by_issued: IntGaugeVec,
    service_users: IntGaugeVec,
    blocked: IntGaugeVec,
    restricted: IntGaugeVec,
    last_login: IntGaugeVec,
    auto_groups_count: IntGaugeVec,
    permissions: IntGaugeVec,
    scrape_errors: IntCounterVec,
    scrape_duration: Histogram,
}

impl UsersCollector {
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            cycle: Mutex::new(()),

            total: IntGaugeVec::new(
                Opts::new("netbird_users_total", "Total number of NetBird users"),
                &[],
            )?,
            by_role: IntGaugeVec::new(
                Opts::new("netbird_users_by_role", "Number of NetBird users by role"),
                &["role"],
            )?,
            by_status: IntGaugeVec::new(
                Opts::new(
                    "netbird_users_by_status",
                    "Number of NetBird users by status",
                ),
                &["status"],
            )?,
            by_issued: IntGaugeVec::new(
                Opts::new(
                    "netbird_users_by_issued",
                    "Number of NetBird users by issuance type",
                ),
                &["issued"],
            )?,
            service_users: IntGaugeVec::new(
                Opts::new(
                    "netbird_users_service_users",
                    "Number of NetBird service users vs regular users",
                ),
                &["is_service_user"],
            )?,
            blocked: IntGaugeVec::new(
                Opts::new("netbird_users_blocked", "Number of blocked NetBird users"),
                &["is_blocked"],
            )?,
            restricted: IntGaugeVec::new(
                Opts::new(
                    "netbird_users_restricted",
                    "Number of NetBird users with restricted permissions",
                ),
                &["is_restricted"],
            )?,
            last_login: IntGaugeVec::new(
                Opts::new(
                    "netbird_user_last_login_timestamp",
                    "Last login timestamp of NetBird users",
                ),
                &["user_id", "user_email", "user_name"],
            )?,
            auto_groups_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_user_auto_groups_count",
                    "Number of auto groups assigned to each NetBird user",
                ),
                &["user_id", "user_email", "user_name"],
            )?,
            permissions: IntGaugeVec::new(
                Opts::new(
                    "netbird_user_permissions",
                    "User permissions by module and action",
                ),
                &["user_id", "user_email", "module", "permission", "value"],
            )?,
            scrape_errors: IntCounterVec::new(
                Opts::new(
                    "netbird_users_scrape_errors_total",
                    "Total number of errors encountered while scraping users",
                ),
                &["error_type"],
            )?,
            scrape_duration: Histogram::with_opts(HistogramOpts::new(
                "netbird_users_scrape_duration_seconds",
                "Time spent scraping users from the NetBird API",
            ))?,
        })
    }

    fn gauges(&self) -> [&IntGaugeVec; 10] {
        [
            &self.total,
            &self.by_role,
            &self.by_status,
            &self.by_issued,
            &self.service_users,
            &self.blocked,
            &self.restricted,
            &self.last_login,
            &self.auto_groups_count,
            &self.permissions,
        ]
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    fn fold(&self, users: &[User]) {
        let mut role_counts: HashMap<String, i64> = HashMap::new();
        let mut status_counts: HashMap<String, i64> = HashMap::new();
        let mut issued_counts: HashMap<String, i64> = HashMap::new();
        let mut service_counts: HashMap<bool, i64> = HashMap::new();
        let mut blocked_counts: HashMap<bool, i64> = HashMap::new();
        let mut restricted_counts: HashMap<bool, i64> = HashMap::new();

        for user in users {
            let role = if user.role.is_empty() {
                UNKNOWN
            } else {
                user.role.as_str()
            };
            *role_counts.entry(role.to_string()).or_default() += 1;

            let status = if user.status.is_empty() {
                UNKNOWN
            } else {
                user.status.as_str()
            };
            *status_counts.entry(status.to_string()).or_default() += 1;

            let issued = if user.issued.is_empty() {
                UNKNOWN
            } else {
                user.issued.as_str()
            };
            *issued_counts.entry(issued.to_string()).or_default() += 1;

            *service_counts.entry(user.is_service_user).or_default() += 1;
            *blocked_counts.entry(user.is_blocked).or_default() += 1;
            *restricted_counts
                .entry(user.permissions.is_restricted)
                .or_default() += 1;

            let user_labels = [user.id.as_str(), user.email.as_str(), user.name.as_str()];

            if let Some(last_login) = user.last_login {
                self.last_login
                    .with_label_values(&user_labels)
                    .set(last_login.timestamp());
            }
            self.auto_groups_count
                .with_label_values(&user_labels)
                .set(user.auto_groups.len() as i64);

            for (module, actions) in &user.permissions.modules {
                for (permission, &allowed) in actions {
                    self.permissions
                        .with_label_values(&[
                            &user.id,
                            &user.email,
                            module,
                            permission,
                            bool_label(allowed),
                        ])
                        .set(1);
                }
            }
        }

        self.total.with_label_values(&[]).set(users.len() as i64);
        for (role, count) in role_counts {
            self.by_role.with_label_values(&[&role]).set(count);
        }
        for (status, count) in status_counts {
            self.by_status.with_label_values(&[&status]).set(count);
        }
        for (issued, count) in issued_counts {
            self.by_issued.with_label_values(&[&issued]).set(count);
        }
        for (value, count) in service_counts {
            self.service_users
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (value, count) in blocked_counts {
            self.blocked
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (value, count) in restricted_counts {
            self.restricted
                .with_label_values(&[bool_label(value)])
                .set(count);
        }

        tracing::debug!(total = users.len(), "Updated user metrics");
    }
}

#[async_trait]
impl ResourceCollector for UsersCollector {
    fn name(&self) -> &'static str {
        "users"
    }

    fn instruments(&self) -> Vec<Box<dyn PromCollector>> {
        let mut instruments: Vec<Box<dyn PromCollector>> = self
            .gauges()
            .iter()
            .map(|gauge| Box::new((*gauge).clone()) as Box<dyn PromCollector>)
            .collect();
        instruments.push(Box::new(self.scrape_errors.clone()));
        instruments.push(Box::new(self.scrape_duration.clone()));
        instruments
    }

    async fn collect(&self) {
        let _cycle = self.cycle.lock().await;
        let timer = self.scrape_duration.start_timer();
        self.reset();

        match self.client.list_users().await {
            Ok(users) => self.fold(&users),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch users");
                self.scrape_errors.with_label_values(&["fetch_users"]).inc();
            }
        }

        timer.observe_duration();
    }
}
