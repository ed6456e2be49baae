//! # Picking Orchestrator
//!
//! Runs one picking operation end to end: assign the scanned item to a
//! basket, light the basket, wait for the operator to press its button,
//! then put every module back to dark.
//!
//! ## Operation States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ASSIGN ──no limit / Full / Rejected──► return (no light touched)       │
//! │    │                                                                    │
//! │    ▼          ┌──────────────── bounded by confirm_timeout ───────────┐ │
//! │  LIGHT_TARGET │ green blink, steady green once confirmed              │ │
//! │    │          │                                                       │ │
//! │    ▼          │                                                       │ │
//! │  ARM_OTHERS   │ every other module dark, button live (one message)    │ │
//! │    │          │                                                       │ │
//! │    ▼          │                                                       │ │
//! │  AWAIT_CONFIRM◄──┐                                                    │ │
//! │    │   │         │ wrong module: red blink + buzzer, remember it      │ │
//! │    │   └─────────┤ same wrong module again: silence it, forget it     │ │
//! │    │             │ unknown module: ignore                             │ │
//! │    │          └───────────────────────────────────────────────────────┘ │
//! │    ▼ target pressed: the put is committed                               │
//! │  SETTLE: lingering wrong module off, debounce delay (failures logged,   │
//! │          cut short at confirm_timeout, never rolled back)               │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  RESET: every module off, on every path                                 │
//! │                                                                         │
//! │  Timeout / shutdown / link error ──► RESET + rollback + Rejected        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ptl_core::protocol;
use ptl_core::{AssignmentResult, ModuleAddress, Placement, WorkedProduct};
use ptl_data::{LimitLookup, ReportSink};
use ptl_link::{CommandService, LinkState, Shutdown};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::PickError;
use crate::state::SharedCarts;

/// Upper bound on each command sent after the outcome is decided.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Settings
// =============================================================================

/// Timing of one picking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickingSettings {
    /// Bound on LIGHT_TARGET through SETTLE. Only expiry before the
    /// confirmation aborts the operation.
    pub confirm_timeout: Duration,
    /// Pause after confirmation.
    pub settle_delay: Duration,
}

impl Default for PickingSettings {
    fn default() -> Self {
        PickingSettings {
            confirm_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives picking operations, one at a time.
pub struct PickingOrchestrator {
    carts: SharedCarts,
    limits: Arc<dyn LimitLookup>,
    commands: CommandService,
    reports: Arc<dyn ReportSink>,
    settings: PickingSettings,
}

impl PickingOrchestrator {
    pub fn new(
        carts: SharedCarts,
        limits: Arc<dyn LimitLookup>,
        commands: CommandService,
        reports: Arc<dyn ReportSink>,
        settings: PickingSettings,
    ) -> Self {
        PickingOrchestrator {
            carts,
            limits,
            commands,
            reports,
            settings,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.commands.state()
    }

    /// Opens the controller link and turns every module off.
    ///
    /// Retries until connected; only shutdown ends it early.
    pub async fn prepare(&mut self, shutdown: &Shutdown) -> Result<(), PickError> {
        self.commands.connect(shutdown).await?;
        let all = self.carts.with_carts(|c| c.all_addresses());
        self.reset_lights(&all).await;
        Ok(())
    }

    /// Closes the controller link.
    pub async fn shutdown(&mut self) {
        self.commands.disconnect().await;
    }

    /// Runs one picking operation for `barcode`.
    ///
    /// Never fails: every error ends as [`AssignmentResult::Rejected`] with
    /// the cart state rolled back and all modules off.
    pub async fn process(&mut self, barcode: &str, shutdown: &Shutdown) -> AssignmentResult {
        let op_id = Uuid::new_v4();
        let span = info_span!("pick", %op_id, barcode);
        self.run(barcode, shutdown).instrument(span).await
    }

    async fn run(&mut self, barcode: &str, shutdown: &Shutdown) -> AssignmentResult {
        // ASSIGN
        let max_quantity = match self.limits.max_for(barcode) {
            Some(max) => max,
            None => {
                let reason = PickError::NoLimit(barcode.to_string()).to_string();
                warn!(%reason, "Scan rejected");
                return AssignmentResult::Rejected(reason);
            }
        };

        let result = self
            .carts
            .with_carts_mut(|c| c.assign_item(barcode, max_quantity));
        let placement = match result.placement() {
            Some(p) => p.clone(),
            None => {
                warn!(
                    kind = result.kind(),
                    reason = result.reason().unwrap_or_default(),
                    "Scan not assigned"
                );
                return result;
            }
        };

        info!(
            kind = result.kind(),
            cart = %placement.cart_id,
            basket = %placement.basket_id,
            address = %placement.address,
            quantity = placement.quantity,
            max_quantity = placement.max_quantity,
            "Item assigned"
        );

        let all = self.carts.with_carts(|c| c.all_addresses());
        let timeout = self.settings.confirm_timeout;

        let deadline = tokio::time::Instant::now() + timeout;

        let outcome = tokio::select! {
            _ = shutdown.wait() => Err(PickError::Cancelled),
            confirmed = tokio::time::timeout_at(deadline, self.light_and_confirm(&placement, &all, shutdown)) => {
                confirmed.unwrap_or(Err(PickError::Timeout(timeout)))
            }
        };

        // The item is in the basket once the target was pressed
        if let Ok(lingering) = &outcome {
            let settled = tokio::time::timeout_at(deadline, self.settle(*lingering, shutdown)).await;
            if settled.is_err() {
                warn!("Settle cut short by the operation timeout");
            }
        }

        // RESET
        self.reset_lights(&all).await;

        match outcome {
            Ok(_) => {
                self.record(&placement);
                info!(cart = %placement.cart_id, basket = %placement.basket_id, "Put confirmed");
                result
            }
            Err(err) => {
                let rolled_back = self.carts.with_carts_mut(|c| c.rollback(&result));
                warn!(error = %err, rolled_back, "Picking operation aborted");
                AssignmentResult::Rejected(err.to_string())
            }
        }
    }

    /// LIGHT_TARGET through AWAIT_CONFIRM. Returns the wrong module still
    /// alarming when the target was pressed.
    async fn light_and_confirm(
        &mut self,
        placement: &Placement,
        all: &[ModuleAddress],
        shutdown: &Shutdown,
    ) -> Result<Option<ModuleAddress>, PickError> {
        let target = placement.address;
        let others: Vec<ModuleAddress> = all.iter().copied().filter(|a| *a != target).collect();

        // Presses from before this operation must not confirm it
        self.commands.drain_events();

        let command = protocol::encode_target(target, &placement.display_text())?;
        self.commands.send_raw(&[target], &command, shutdown).await?;

        if !others.is_empty() {
            self.arm(&others, shutdown).await?;
        }

        let mut last_wrong: Option<ModuleAddress> = None;
        loop {
            let pressed = self.commands.wait_for_button(shutdown).await?;

            if pressed == target {
                debug!(address = %pressed, "Target button pressed");
                break;
            }

            if !all.contains(&pressed) {
                warn!(address = %pressed, "Button press from unconfigured module ignored");
                continue;
            }

            if last_wrong == Some(pressed) {
                info!(address = %pressed, "Wrong basket alarm acknowledged");
                self.arm(&[pressed], shutdown).await?;
                last_wrong = None;
                continue;
            }

            if let Some(previous) = last_wrong.take() {
                self.arm(&[previous], shutdown).await?;
            }

            warn!(address = %pressed, target = %target, "Wrong basket button pressed");
            let command = protocol::encode_error_flash(pressed)?;
            self.commands.send_raw(&[pressed], &command, shutdown).await?;
            last_wrong = Some(pressed);
        }

        Ok(last_wrong)
    }

    /// SETTLE. The put is already confirmed, so failures are only logged.
    async fn settle(&mut self, lingering: Option<ModuleAddress>, shutdown: &Shutdown) {
        if let Some(wrong) = lingering {
            if let Err(e) = self.turn_off(&[wrong], shutdown).await {
                warn!(error = %e, address = %wrong, "Could not silence wrong basket module");
            }
        }

        tokio::select! {
            _ = shutdown.wait() => {}
            _ = tokio::time::sleep(self.settings.settle_delay) => {}
        }
    }

    /// Dark and silent, button live.
    async fn arm(&mut self, addresses: &[ModuleAddress], shutdown: &Shutdown) -> Result<(), PickError> {
        let command = protocol::encode_armed(addresses)?;
        self.commands.send_raw(addresses, &command, shutdown).await?;
        Ok(())
    }

    /// Every module off. Runs even after shutdown; failures are only logged.
    async fn reset_lights(&mut self, all: &[ModuleAddress]) {
        match self.turn_off(all, &Shutdown::never()).await {
            Ok(()) => debug!(modules = all.len(), "All modules off"),
            Err(e) => error!(error = %e, "Failed to turn modules off"),
        }
    }

    /// Off command bounded by [`CLEANUP_TIMEOUT`].
    async fn turn_off(&mut self, addresses: &[ModuleAddress], shutdown: &Shutdown) -> Result<(), PickError> {
        let command = protocol::encode_off(addresses)?;
        match tokio::time::timeout(CLEANUP_TIMEOUT, self.commands.send_raw(addresses, &command, shutdown)).await {
            Ok(sent) => Ok(sent?),
            Err(_) => Err(PickError::Timeout(CLEANUP_TIMEOUT)),
        }
    }

    fn record(&self, placement: &Placement) {
        let product = WorkedProduct {
            timestamp: Utc::now(),
            cart_id: placement.cart_id.clone(),
            basket_id: placement.basket_id.clone(),
            barcode: placement.barcode.clone(),
            quantity: placement.quantity,
        };
        if let Err(e) = self.reports.record_pick(&product) {
            error!(error = %e, "Failed to record pick");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ptl_core::{Basket, Cart, CartContainer};
    use ptl_data::{BarcodeLimits, LimitsConfig, MemoryReportSink};
    use ptl_link::testing::ScriptedConnector;
    use ptl_link::{shutdown, LinkError, LinkSettings};

    fn addr(raw: u16) -> ModuleAddress {
        ModuleAddress::new(raw).unwrap()
    }

    struct Fixture {
        orchestrator: PickingOrchestrator,
        connector: ScriptedConnector,
        carts: SharedCarts,
        reports: Arc<MemoryReportSink>,
    }

    /// One cart, baskets 1 and 2 on modules 0001 and 0002.
    fn fixture(limits: &[(&str, u32)]) -> Fixture {
        fixture_with_baskets(2, limits)
    }

    /// One cart, basket `n` on module `n` for every `n` in `1..=count`.
    fn fixture_with_baskets(count: u16, limits: &[(&str, u32)]) -> Fixture {
        let baskets = (1..=count)
            .map(|n| Basket::new(n.to_string(), addr(n)))
            .collect();
        let container = CartContainer::new(vec![Cart::new("1", baskets)]).unwrap();
        let carts = SharedCarts::new(container);
        let limits = BarcodeLimits::from_entries(
            LimitsConfig::new("limits.csv"),
            limits.iter().map(|(b, m)| (b.to_string(), *m)),
        );
        let connector = ScriptedConnector::new();
        let reports = Arc::new(MemoryReportSink::new());
        let commands = CommandService::new(Arc::new(connector.clone()), &LinkSettings::default());

        let orchestrator = PickingOrchestrator::new(
            carts.clone(),
            Arc::new(limits),
            commands,
            reports.clone(),
            PickingSettings::default(),
        );

        Fixture {
            orchestrator,
            connector,
            carts,
            reports,
        }
    }

    fn off_all() -> String {
        protocol::encode_off(&[addr(1), addr(2)]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_confirm_records_pick() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(1));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        let placement = match &result {
            AssignmentResult::NewItem(p) => p.clone(),
            other => panic!("expected NewItem, got {:?}", other),
        };
        assert_eq!(placement.basket_id, "1");
        assert_eq!(placement.max_quantity, 3);
        assert_eq!(placement.quantity, 1);

        assert_eq!(
            f.connector.sent(),
            vec![
                protocol::encode_target(addr(1), "  1/3").unwrap(),
                protocol::encode_armed(&[addr(2)]).unwrap(),
                off_all(),
            ]
        );

        let picks = f.reports.picks();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].cart_id, "1");
        assert_eq!(picks[0].basket_id, "1");
        assert_eq!(picks[0].barcode, "X");
        assert_eq!(picks[0].quantity, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_scan_same_basket() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(1));
        f.connector.press_after(5, addr(1));
        let never = Shutdown::never();

        f.orchestrator.process("X", &never).await;
        let result = f.orchestrator.process("X", &never).await;

        assert_eq!(result.kind(), "existing_item");
        assert_eq!(result.placement().unwrap().quantity, 2);
        assert_eq!(
            f.connector.sent()[3],
            protocol::encode_target(addr(1), "  2/3").unwrap()
        );
        assert_eq!(f.reports.picks().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_then_target() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(2));
        f.connector.press_after(2, addr(1));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert!(result.is_success());
        let sent = f.connector.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[2], protocol::encode_error_flash(addr(2)).unwrap());
        // Lingering alarm silenced during SETTLE
        assert_eq!(sent[3], protocol::encode_off(&[addr(2)]).unwrap());
        assert_eq!(sent[4], off_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_wrong_twice_is_acknowledgement() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(2));
        f.connector.press_after(2, addr(2));
        f.connector.press_after(2, addr(1));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert!(result.is_success());
        let sent = f.connector.sent();
        let flash = protocol::encode_error_flash(addr(2)).unwrap();
        assert_eq!(sent.iter().filter(|c| **c == flash).count(), 1);
        assert_eq!(sent[3], protocol::encode_armed(&[addr(2)]).unwrap());
        assert_eq!(sent.last().unwrap(), &off_all());
        assert_eq!(result.placement().unwrap().basket_id, "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_wrong_module_silences_previous() {
        let mut f = fixture_with_baskets(3, &[("X", 3)]);
        f.connector.press_after(2, addr(2));
        f.connector.press_after(2, addr(3));
        f.connector.press_after(2, addr(1));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert!(result.is_success());
        assert_eq!(
            f.connector.sent(),
            vec![
                protocol::encode_target(addr(1), "  1/3").unwrap(),
                protocol::encode_armed(&[addr(2), addr(3)]).unwrap(),
                protocol::encode_error_flash(addr(2)).unwrap(),
                protocol::encode_armed(&[addr(2)]).unwrap(),
                protocol::encode_error_flash(addr(3)).unwrap(),
                protocol::encode_off(&[addr(3)]).unwrap(),
                protocol::encode_off(&[addr(1), addr(2), addr(3)]).unwrap(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_failure_keeps_confirmed_put() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(2));
        f.connector.press_after(2, addr(1));
        // The off command for the lingering wrong module
        f.connector.fail_send_at(4, LinkError::Nak("NG".to_string()));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert_eq!(result.kind(), "new_item");
        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 1);
        assert_eq!(f.reports.picks().len(), 1);
        let sent = f.connector.sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[3], protocol::encode_off(&[addr(2)]).unwrap());
        assert_eq!(sent[4], off_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_link_rejects_without_waiting_for_timeout() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.close_events_after(2);
        let started = tokio::time::Instant::now();

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        match result {
            AssignmentResult::Rejected(reason) => assert!(reason.contains("controller link failed")),
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 0);
        assert!(f.reports.picks().is_empty());
        // Reconnected for the final all-off
        assert_eq!(f.connector.connect_count(), 2);
        assert_eq!(f.connector.sent().last().unwrap(), &off_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_module_ignored() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.press_after(2, addr(77));
        f.connector.press_after(2, addr(1));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert!(result.is_success());
        assert_eq!(f.connector.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rolls_back() {
        let mut f = fixture(&[("X", 3)]);

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        assert_eq!(
            result,
            AssignmentResult::Rejected("no confirmation within 30 s".to_string())
        );
        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 0);
        let basket = f.carts.with_carts(|c| c.basket("1", "1").cloned()).unwrap();
        assert_eq!(basket.max_quantity(), 0);
        assert_eq!(f.connector.sent().last().unwrap(), &off_all());
        assert!(f.reports.picks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_fault_rolls_back() {
        let mut f = fixture(&[("X", 3)]);
        f.connector.fail_send_at(2, LinkError::Nak("NG".to_string()));

        let result = f.orchestrator.process("X", &Shutdown::never()).await;

        match result {
            AssignmentResult::Rejected(reason) => assert!(reason.contains("controller link failed")),
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 0);
        assert_eq!(f.connector.sent().len(), 3);
        assert_eq!(f.connector.sent()[2], off_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_limit_touches_nothing() {
        let mut f = fixture(&[("X", 3)]);

        let result = f.orchestrator.process("UNKNOWN", &Shutdown::never()).await;

        assert_eq!(result.kind(), "rejected");
        assert!(f.connector.sent().is_empty());
        assert_eq!(f.connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_room_touches_nothing() {
        let mut f = fixture(&[("X", 1), ("Y", 1), ("Z", 1)]);
        f.connector.press_after(2, addr(1));
        f.connector.press_after(5, addr(2));
        let never = Shutdown::never();

        assert!(f.orchestrator.process("X", &never).await.is_success());
        assert!(f.orchestrator.process("Y", &never).await.is_success());
        let sent_before = f.connector.sent().len();

        let result = f.orchestrator.process("Z", &never).await;

        assert_eq!(result.kind(), "rejected");
        assert_eq!(f.connector.sent().len(), sent_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_resets() {
        let mut f = fixture(&[("X", 3)]);
        let (trigger, shutdown) = shutdown::channel();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.trigger();
        });

        let result = f.orchestrator.process("X", &shutdown).await;
        stopper.await.unwrap();

        assert_eq!(result, AssignmentResult::Rejected("cancelled by shutdown".to_string()));
        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 0);
        assert_eq!(f.connector.sent().last().unwrap(), &off_all());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_connects_and_darkens() {
        let mut f = fixture(&[]);

        f.orchestrator.prepare(&Shutdown::never()).await.unwrap();

        assert_eq!(f.orchestrator.link_state(), LinkState::Connected);
        assert_eq!(f.connector.sent(), vec![off_all()]);

        f.orchestrator.shutdown().await;
        assert_eq!(f.connector.close_count(), 1);
    }
}
