// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Delivery channels (Slack, Email) that stamp each report with a delivery time and count them
// role: delivery/dispatch
// inputs: Report batch; delivery instant; channel settings (EmailTarget)
// outputs: DeliveryStatus records, stamped Report copies, status lines
// side_effects: None; channels do not transmit anything yet
// invariants:
// - Every report in the batch gets exactly one status per dispatch; count == batch length
// - Dispatching twice overwrites the earlier timestamp
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use tracing::info;

use crate::config::EmailTarget;
use crate::error::ReportResult;
use crate::model::{Channel, DeliveryStatus, Report};
use crate::report::apply_deliveries;

pub trait Dispatcher {
  fn channel(&self) -> Channel;
  fn deliver(&self, reports: &[Report], delivered_at: &str) -> ReportResult<Vec<DeliveryStatus>>;
}

fn stamp_all(channel: Channel, reports: &[Report], delivered_at: &str) -> Vec<DeliveryStatus> {
  reports
    .iter()
    .map(|r| DeliveryStatus { report_id: r.id.clone(), channel, delivered_at: delivered_at.to_string() })
    .collect()
}

pub struct SlackDispatcher;

impl Dispatcher for SlackDispatcher {
  fn channel(&self) -> Channel {
    Channel::Slack
  }

  fn deliver(&self, reports: &[Report], delivered_at: &str) -> ReportResult<Vec<DeliveryStatus>> {
    Ok(stamp_all(Channel::Slack, reports, delivered_at))
  }
}

pub struct EmailDispatcher {
  target: EmailTarget,
}

impl EmailDispatcher {
  pub fn new(target: EmailTarget) -> Self {
    Self { target }
  }
}

impl Dispatcher for EmailDispatcher {
  fn channel(&self) -> Channel {
    Channel::Email
  }

  fn deliver(&self, reports: &[Report], delivered_at: &str) -> ReportResult<Vec<DeliveryStatus>> {
    info!(
      recipient = %self.target.recipient,
      subject = %self.target.subject,
      smtp_host = %self.target.smtp.host,
      smtp_port = self.target.smtp.port,
      count = reports.len(),
      "email delivery"
    );
    Ok(stamp_all(Channel::Email, reports, delivered_at))
  }
}

#[derive(Debug, Clone)]
pub struct Dispatched {
  pub channel: Channel,
  pub count: usize,
  pub reports: Vec<Report>,
}

impl Dispatched {
  pub fn status_line(&self) -> String {
    format!("[{}] {} reports sent!", self.channel, self.count)
  }
}

/// Deliver a batch and return stamped copies of the reports.
pub fn dispatch(dispatcher: &dyn Dispatcher, reports: &[Report], delivered_at: &str) -> ReportResult<Dispatched> {
  let statuses = dispatcher.deliver(reports, delivered_at)?;
  let (stamped, count) = apply_deliveries(reports, statuses);

  info!(channel = %dispatcher.channel(), count, "reports dispatched");

  Ok(Dispatched { channel: dispatcher.channel(), count, reports: stamped })
}
