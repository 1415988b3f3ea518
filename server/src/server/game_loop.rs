// world_server_core/server/src/server/game_loop.rs
use super::instance::WorldServer;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const FRAME_LOG_INTERVAL: u64 = 1200;

impl WorldServer {
    /// Fixed-rate world loop. Stops on Ctrl-C or when the map manager raises
    /// its shutdown flag, then unloads every map.
    pub async fn run_world_loop(self: Arc<Self>) {
        let tick_duration = Duration::from_millis(1000 / self.config.tick_rate.max(1));
        let mut tick_timer = interval(tick_duration);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick_time = Instant::now();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        info!("World loop started. Tick: {}ms", tick_duration.as_millis());

        loop {
            tokio::select! {
                _ = tick_timer.tick() => {}
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, stopping world loop");
                    break;
                }
            }
            if self.map_manager.is_shutdown_requested() {
                warn!("Shutdown requested by the map manager");
                break;
            }

            let frame_start_time = Instant::now();
            let diff = frame_start_time.duration_since(last_tick_time).as_millis().min(u32::MAX as u128) as u32;
            last_tick_time = frame_start_time;

            let world = Arc::clone(&self);
            tokio::task::block_in_place(move || world.tick(diff));

            let frame_time = frame_start_time.elapsed();
            let frame = self.frame_counter.fetch_add(1, AtomicOrdering::Relaxed) + 1;
            if frame_time > tick_duration {
                warn!("Frame {} took {:?} (target: {:?})", frame, frame_time, tick_duration);
            }
            if frame % FRAME_LOG_INTERVAL == 0 {
                debug!(
                    "Frame {}: {} maps, {} instances, {} players in instances",
                    frame,
                    self.map_manager.map_count(),
                    self.map_manager.num_instances(),
                    self.map_manager.num_players_in_instances()
                );
            }
        }

        self.shutdown();
    }
}
