use crate::fetcher::ChannelFetcher;
use crate::metrics::{BUFFER_POINTS, CYCLES_TOTAL, CYCLE_LATENCY_SECONDS};
use crate::model::Channel;
use crate::render::{render, Dashboard};
use crate::store::AccumulationStore;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Sole writer of the accumulation store. Each rendered dashboard is
/// published whole, so readers never observe a partially applied cycle.
pub struct Poller {
    fetcher: ChannelFetcher,
    store: AccumulationStore,
    timezone: Tz,
    tx: watch::Sender<Arc<Dashboard>>,
    cycle: u64,
}

impl Poller {
    pub fn new(
        fetcher: ChannelFetcher,
        store: AccumulationStore,
        timezone: Tz,
    ) -> (Self, watch::Receiver<Arc<Dashboard>>) {
        let (tx, rx) = watch::channel(Arc::new(Dashboard::empty()));
        let poller = Self {
            fetcher,
            store,
            timezone,
            tx,
            cycle: 0,
        };
        (poller, rx)
    }

    pub fn store(&self) -> &AccumulationStore {
        &self.store
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Fetches every channel, applies the results once all have returned,
    /// then publishes the rendered dashboard.
    pub async fn run_cycle(&mut self) {
        let start = Instant::now();
        self.cycle += 1;

        let (luminosity, temperature, humidity) = tokio::join!(
            self.fetcher.fetch(Channel::Luminosity),
            self.fetcher.fetch(Channel::Temperature),
            self.fetcher.fetch(Channel::Humidity),
        );

        for (channel, points) in [
            (Channel::Luminosity, luminosity),
            (Channel::Temperature, temperature),
            (Channel::Humidity, humidity),
        ] {
            let fetched = points.len();
            let taken = self.store.apply(channel, points);
            let retained = self.store.len(channel);
            BUFFER_POINTS
                .with_label_values(&[channel.as_str()])
                .set(retained as f64);
            debug!(
                "Cycle {}: {} fetched={} taken={} retained={}",
                self.cycle, channel, fetched, taken, retained
            );
        }

        let updated_at = Utc::now().with_timezone(&self.timezone);
        let dashboard = render(&self.store.snapshot(), self.cycle, Some(updated_at));
        self.tx.send_replace(Arc::new(dashboard));

        let elapsed = start.elapsed().as_secs_f64();
        CYCLES_TOTAL.inc();
        CYCLE_LATENCY_SECONDS.observe(elapsed);
        debug!("Cycle {} completed in {:.3}s", self.cycle, elapsed);
    }
}

/// Runs one cycle per tick until every dashboard reader is gone. Ticks that
/// fall due while a cycle is still running are dropped.
pub async fn run_poller(mut poller: Poller, period: Duration) {
    info!("Starting poller with period={:?}", period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        poller.run_cycle().await;

        if poller.tx.is_closed() {
            info!("No dashboard readers left");
            break;
        }
    }

    info!(
        "Poller stopped after {} cycles with {} luminosity points retained",
        poller.cycle(),
        poller.store().len(Channel::Luminosity)
    );
}
