//! Stale-game reaper.
//!
//! Walks the active-rooms set and repairs what crashed instances left
//! behind:
//!
//! - a COUNTDOWN whose end passed more than the grace period ago is
//!   completed here, since its owner's timer is gone
//! - a completed game whose prize is still pending gets its payout retried
//! - a COUNTDOWN or PLAYING game without any update for the stale window
//!   is purged
//! - a PLAYING game whose drawing lock expired is taken over; the lock
//!   makes this a no-op while the owner is alive
//! - a COMPLETED game past its retention window is purged, in case the
//!   scheduled purge died with its instance
//! - a room whose hash already expired is dropped from the set

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bingo_core::result::AppResult;
use bingo_core::types::{GameState, GameStatus};
use bingo_service::GameOrchestrator;

/// Counters of one reaper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Rooms found in the active set.
    pub scanned: usize,
    /// Overdue countdowns completed.
    pub countdowns_completed: usize,
    /// Pending payouts settled.
    pub payouts_settled: usize,
    /// Drawing loops taken over from a lost owner.
    pub drawings_resumed: usize,
    /// Games purged.
    pub purged: usize,
    /// Rooms dropped from the active set without a game.
    pub forgotten: usize,
    /// Rooms whose repair failed; retried next pass.
    pub failed: usize,
}

impl ReapReport {
    /// Whether the pass changed anything.
    pub fn is_idle(&self) -> bool {
        self.countdowns_completed == 0
            && self.payouts_settled == 0
            && self.drawings_resumed == 0
            && self.purged == 0
            && self.forgotten == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    CompleteCountdown,
    SettlePayout,
    ResumeDrawing,
    Purge(&'static str),
}

/// Periodic repair of abandoned games.
#[derive(Debug, Clone)]
pub struct GameReaper {
    orchestrator: GameOrchestrator,
    countdown_grace: Duration,
    running: Arc<Mutex<()>>,
}

impl GameReaper {
    /// Create a reaper. Countdowns overdue by more than `countdown_grace`
    /// are completed by the reaper.
    pub fn new(orchestrator: GameOrchestrator, countdown_grace: Duration) -> Self {
        Self {
            orchestrator,
            countdown_grace,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Run one pass, skipping it if the previous pass is still running.
    pub async fn run(&self) {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Previous reaper pass still running");
            return;
        };
        match self.reap_once().await {
            Ok(report) if report.is_idle() => {
                debug!(scanned = report.scanned, "Reaper pass found nothing to do");
            }
            Ok(report) => info!(
                scanned = report.scanned,
                countdowns_completed = report.countdowns_completed,
                payouts_settled = report.payouts_settled,
                drawings_resumed = report.drawings_resumed,
                purged = report.purged,
                forgotten = report.forgotten,
                failed = report.failed,
                "Reaper pass finished"
            ),
            Err(e) => warn!(error = %e, "Reaper pass failed"),
        }
    }

    /// Inspect every active room once.
    pub async fn reap_once(&self) -> AppResult<ReapReport> {
        let games = self.orchestrator.games();
        let now = Utc::now();
        let mut report = ReapReport::default();

        for room_id in games.active_rooms().await? {
            report.scanned += 1;
            let state = match games.load(room_id).await {
                Ok(Some(state)) => state,
                Ok(None) => {
                    if games.forget_room(room_id).await? {
                        debug!(room_id = %room_id, "Dropped room without a game");
                        report.forgotten += 1;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(room_id = %room_id, error = %e, "Failed to load game");
                    report.failed += 1;
                    continue;
                }
            };

            match self.verdict(&state, now) {
                Verdict::Keep => {}
                Verdict::CompleteCountdown => {
                    match self
                        .orchestrator
                        .complete_countdown(room_id, state.game_id)
                        .await
                    {
                        Ok(Some(status)) => {
                            info!(room_id = %room_id, game_id = %state.game_id, status = %status, "Recovered overdue countdown");
                            report.countdowns_completed += 1;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(game_id = %state.game_id, code = e.code(), error = %e, "Countdown recovery failed");
                            report.failed += 1;
                        }
                    }
                }
                Verdict::SettlePayout => {
                    match self
                        .orchestrator
                        .settle_payout(room_id, state.game_id)
                        .await
                    {
                        Ok(true) => report.payouts_settled += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(game_id = %state.game_id, code = e.code(), error = %e, "Payout settlement failed");
                            report.failed += 1;
                        }
                    }
                }
                Verdict::ResumeDrawing => {
                    match self
                        .orchestrator
                        .resume_drawing(room_id, state.game_id)
                        .await
                    {
                        Ok(true) => report.drawings_resumed += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(game_id = %state.game_id, error = %e, "Drawing takeover failed");
                            report.failed += 1;
                        }
                    }
                }
                Verdict::Purge(reason) => match self.orchestrator.finalizer().purge(&state).await {
                    Ok(()) => {
                        info!(room_id = %room_id, game_id = %state.game_id, status = %state.status, reason, "Reaped game");
                        report.purged += 1;
                    }
                    Err(e) => {
                        warn!(game_id = %state.game_id, error = %e, "Purge failed");
                        report.failed += 1;
                    }
                },
            }
        }
        Ok(report)
    }

    fn verdict(&self, state: &GameState, now: DateTime<Utc>) -> Verdict {
        let config = &self.orchestrator.context().config;
        if state.status == GameStatus::Countdown
            && state
                .countdown_end_time
                .is_some_and(|end| elapsed_beyond(now, end, self.countdown_grace))
        {
            return Verdict::CompleteCountdown;
        }
        if state.payout_pending && state.winner.is_some() {
            return Verdict::SettlePayout;
        }
        if state.is_stale(now, config.stale_after()) {
            return Verdict::Purge("stale");
        }
        if state.is_drawing() {
            return Verdict::ResumeDrawing;
        }
        if (state.ended || state.status.is_terminal())
            && elapsed_beyond(now, state.status_updated_at, config.post_game_retention())
        {
            return Verdict::Purge("retention elapsed");
        }
        Verdict::Keep
    }
}

fn elapsed_beyond(now: DateTime<Utc>, since: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(since)
        .to_std()
        .is_ok_and(|elapsed| elapsed > window)
}
