//! The unattended big-screen loop.
//!
//! One task owns all state and multiplexes the controller clock, quote
//! rotation, realtime changes, operator commands on stdin and Ctrl-C.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cycle::{Controller, CycleEvent, ResumePolicy};
use crate::db;
use crate::flow::{self, FlowGraph};
use crate::layout::Viewport;
use crate::models::{ApprovedQuote, Attribute};
use crate::realtime::{self, ChangeEvent, Subscription};
use crate::render::{self, Frame, Mode};
use crate::settings::DisplaySettings;
use crate::store::{self, WorkingSet};

pub const QUOTE_ROTATION: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(Attribute, Attribute),
    Hover(usize),
    Unhover,
    Auto(bool),
    Speed(u64),
    Theme,
    Data,
    Color(Attribute, String, String),
    Reset,
    Mode(Mode),
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let Some((&name, args)) = tokens.split_first() else {
            return Err("empty command".to_string());
        };

        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("select", [source, target]) => Command::Select(source.parse()?, target.parse()?),
            ("hover", [index]) => Command::Hover(
                index
                    .parse()
                    .map_err(|_| format!("'{index}' is not a source index"))?,
            ),
            ("unhover", []) => Command::Unhover,
            ("auto", ["on"]) => Command::Auto(true),
            ("auto", ["off"]) => Command::Auto(false),
            ("speed", [ms]) => Command::Speed(
                ms.parse()
                    .map_err(|_| format!("'{ms}' is not a speed in milliseconds"))?,
            ),
            ("theme", []) => Command::Theme,
            ("data", []) => Command::Data,
            ("color", [attribute, value @ .., hex]) if !value.is_empty() => {
                Command::Color(attribute.parse()?, value.join(" "), hex.to_string())
            }
            ("reset", []) => Command::Reset,
            ("mode", [mode]) => Command::Mode(mode.parse()?),
            _ => return Err(format!("unrecognised command '{}'", s.trim())),
        };
        Ok(command)
    }
}

/// What the loop must do after a change to the screen state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Redraw,
    /// The data source changed: fetch a new working set.
    Reload,
}

#[derive(Debug, Clone)]
pub struct DisplayOptions {
    pub source: Attribute,
    pub target: Attribute,
    pub mode: Mode,
    pub out: PathBuf,
    pub tick: Duration,
    pub viewport: Viewport,
    pub policy: ResumePolicy,
}

/// Screen state, free of any I/O.
pub struct Screen {
    pub settings: DisplaySettings,
    pub set: WorkingSet,
    pub graph: FlowGraph,
    pub controller: Controller,
    pub quotes: Vec<ApprovedQuote>,
    pub quote_index: usize,
    pub mode: Mode,
    pub viewport: Viewport,
}

impl Screen {
    pub fn new(settings: DisplaySettings, set: WorkingSet, options: &DisplayOptions) -> Self {
        let mut controller = Controller::new(
            options.source,
            options.target,
            Duration::from_millis(settings.auto_play_speed_ms),
        )
        .with_policy(options.policy);
        let graph = flow::aggregate(set.records(), options.source, options.target);
        controller.set_source_count(graph.sources.len());
        controller.set_enabled(settings.auto_play);

        Self {
            settings,
            set,
            graph,
            controller,
            quotes: Vec::new(),
            quote_index: 0,
            mode: options.mode,
            viewport: options.viewport,
        }
    }

    /// Re-aggregate for the controller's current pair.
    pub fn rebuild(&mut self) {
        self.graph = flow::aggregate(
            self.set.records(),
            self.controller.source(),
            self.controller.target(),
        );
        self.controller.set_source_count(self.graph.sources.len());
    }

    pub fn replace_set(&mut self, set: WorkingSet) {
        if set.is_empty() {
            warn!(source = ?set.source(), "working set is empty");
        } else {
            info!(source = ?set.source(), records = set.len(), sample = set.is_sample(), "working set replaced");
        }
        self.set = set;
        self.rebuild();
    }

    pub fn set_quotes(&mut self, quotes: Vec<ApprovedQuote>) {
        self.quotes = quotes;
        if self.quote_index >= self.quotes.len() {
            self.quote_index = 0;
        }
    }

    pub fn current_quote(&self) -> Option<&ApprovedQuote> {
        self.quotes.get(self.quote_index)
    }

    /// Advance to the next quote. Returns true when the shown quote changed.
    pub fn rotate_quote(&mut self) -> bool {
        if self.quotes.len() < 2 {
            return false;
        }
        self.quote_index = (self.quote_index + 1) % self.quotes.len();
        true
    }

    pub fn on_cycle_events(&mut self, events: &[CycleEvent]) -> Effect {
        if events.is_empty() {
            return Effect::None;
        }
        if events.iter().any(|event| matches!(event, CycleEvent::TargetChanged(_))) {
            self.rebuild();
            info!(
                target = %self.controller.target(),
                rotations = self.controller.rotations(),
                "category switched"
            );
        }
        debug!(state = ?self.controller.state(), "cycle advanced");
        Effect::Redraw
    }

    pub fn apply(&mut self, command: Command) -> Effect {
        match command {
            Command::Select(source, target) => {
                self.controller.select_pair(source, target);
                self.rebuild();
            }
            Command::Hover(index) => {
                if index >= self.graph.sources.len() {
                    warn!(index, sources = self.graph.sources.len(), "hover index out of range");
                    return Effect::None;
                }
                self.controller.hover(Some(index));
            }
            Command::Unhover => {
                self.controller.hover(None);
            }
            Command::Auto(enabled) => {
                self.settings.auto_play = enabled;
                self.controller.set_enabled(enabled);
            }
            Command::Speed(speed_ms) => {
                let applied = self.settings.set_speed(speed_ms);
                self.controller.set_base_speed(Duration::from_millis(applied));
                info!(speed_ms = applied, "auto-play speed set");
            }
            Command::Theme => {
                self.settings.toggle_theme();
            }
            Command::Data => {
                let source = self.settings.toggle_data_source();
                info!(?source, "data source switched");
                return Effect::Reload;
            }
            Command::Color(attribute, value, hex) => {
                if !self.settings.set_color(attribute, &value, &hex) {
                    debug!(%attribute, %value, %hex, "colour unchanged");
                    return Effect::None;
                }
            }
            Command::Reset => {
                let previous = self.settings.data_source;
                self.settings.reset();
                self.controller
                    .set_base_speed(Duration::from_millis(self.settings.auto_play_speed_ms));
                self.controller.set_enabled(self.settings.auto_play);
                if self.settings.data_source != previous {
                    return Effect::Reload;
                }
            }
            Command::Mode(mode) => self.mode = mode,
        }
        Effect::Redraw
    }

    pub fn render(&self) -> String {
        let frame = Frame {
            graph: &self.graph,
            settings: &self.settings,
            highlight: self.controller.active_highlight(),
            quote: self.current_quote(),
            viewport: self.viewport,
        };
        render::render(&frame, self.mode)
    }
}

async fn load_quotes(pool: &PgPool, screen: &Screen) -> Vec<ApprovedQuote> {
    match db::approved_quotes(pool, screen.settings.data_source).await {
        Ok(quotes) => quotes,
        Err(err) => {
            warn!(error = %err, "failed to fetch approved quotes");
            Vec::new()
        }
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> anyhow::Result<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

fn draw(screen: &Screen, out: &Path) {
    if let Err(err) = std::fs::write(out, screen.render()) {
        error!(path = %out.display(), error = %err, "failed to write frame");
    }
}

pub async fn run(
    pool: &PgPool,
    channel: &str,
    settings: DisplaySettings,
    options: DisplayOptions,
) -> anyhow::Result<()> {
    let set = store::load(pool, settings.data_source).await;
    let mut screen = Screen::new(settings, set, &options);
    let quotes = load_quotes(pool, &screen).await;
    screen.set_quotes(quotes);

    let mut subscription = match Subscription::connect(pool, channel).await {
        Ok(subscription) => Some(subscription),
        Err(err) => {
            warn!(error = %err, "realtime updates unavailable");
            None
        }
    };

    let mut clock = interval(options.tick);
    clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut quote_clock = interval(QUOTE_ROTATION);
    quote_clock.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last = Instant::now();
    draw(&screen, &options.out);
    info!(out = %options.out.display(), view = %screen.graph.view_label(), "display running");

    loop {
        let effect = tokio::select! {
            _ = clock.tick() => {
                let now = Instant::now();
                let events = screen.controller.tick(now - last);
                last = now;
                screen.on_cycle_events(&events)
            }
            _ = quote_clock.tick() => {
                if screen.rotate_quote() { Effect::Redraw } else { Effect::None }
            }
            change = next_change(&mut subscription) => match change {
                Ok(event) => match realtime::apply(pool, &mut screen.set, event).await {
                    Ok(true) => {
                        screen.rebuild();
                        let quotes = load_quotes(pool, &screen).await;
                        screen.set_quotes(quotes);
                        Effect::Redraw
                    }
                    Ok(false) => Effect::None,
                    Err(err) => {
                        warn!(error = %err, id = %event.id(), "failed to merge change");
                        Effect::None
                    }
                },
                Err(err) => {
                    warn!(error = %err, "realtime listener failed, continuing without updates");
                    subscription = None;
                    Effect::None
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => Effect::None,
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => screen.apply(command),
                    Err(err) => {
                        println!("{err}");
                        Effect::None
                    }
                },
                Ok(None) => {
                    stdin_open = false;
                    Effect::None
                }
                Err(err) => {
                    warn!(error = %err, "failed to read command");
                    stdin_open = false;
                    Effect::None
                }
            },
            _ = &mut shutdown => break,
        };

        match effect {
            Effect::None => {}
            Effect::Redraw => draw(&screen, &options.out),
            Effect::Reload => {
                let set = store::load(pool, screen.settings.data_source).await;
                screen.replace_set(set);
                let quotes = load_quotes(pool, &screen).await;
                screen.set_quotes(quotes);
                draw(&screen, &options.out);
            }
        }
    }

    if let Some(subscription) = subscription {
        if let Err(err) = subscription.close().await {
            warn!(error = %err, "failed to detach realtime listener");
        }
    }
    info!("display stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleState;
    use crate::settings::DataSource;

    fn options() -> DisplayOptions {
        DisplayOptions {
            source: Attribute::Tenure,
            target: Attribute::LearningStyle,
            mode: Mode::Alluvial,
            out: PathBuf::from("pulse.svg"),
            tick: Duration::from_millis(100),
            viewport: Viewport::default(),
            policy: ResumePolicy::default(),
        }
    }

    fn screen() -> Screen {
        Screen::new(
            DisplaySettings::default(),
            WorkingSet::sample(DataSource::Live),
            &options(),
        )
    }

    #[test]
    fn parses_operator_commands() {
        assert_eq!(
            "select tenure motivation".parse::<Command>().unwrap(),
            Command::Select(Attribute::Tenure, Attribute::Motivation)
        );
        assert_eq!("hover 2".parse::<Command>().unwrap(), Command::Hover(2));
        assert_eq!("auto off".parse::<Command>().unwrap(), Command::Auto(false));
        assert_eq!("speed 4000".parse::<Command>().unwrap(), Command::Speed(4000));
        assert_eq!("mode chord".parse::<Command>().unwrap(), Command::Mode(Mode::Chord));
        assert_eq!(
            "color learning_style Kinesthetic (Doing) #00FF00"
                .parse::<Command>()
                .unwrap(),
            Command::Color(
                Attribute::LearningStyle,
                "Kinesthetic (Doing)".to_string(),
                "#00FF00".to_string()
            )
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!("".parse::<Command>().is_err());
        assert!("select tenure".parse::<Command>().is_err());
        assert!("hover first".parse::<Command>().is_err());
        assert!("auto maybe".parse::<Command>().is_err());
        assert!("color tenure #FFFFFF".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn screen_starts_cycling_on_sample_data() {
        let screen = screen();
        assert_eq!(screen.controller.state(), CycleState::FullOpacityPause);
        assert_eq!(screen.controller.source(), Attribute::Tenure);
        assert_eq!(screen.graph.sources.len(), 5);
    }

    #[test]
    fn manual_selection_rebuilds_the_graph() {
        let mut screen = screen();
        let effect = screen.apply(Command::Select(Attribute::Motivation, Attribute::ShapedBy));
        assert_eq!(effect, Effect::Redraw);
        assert_eq!(screen.graph.source, Attribute::Motivation);
        assert_eq!(screen.graph.target, Attribute::ShapedBy);
        assert_eq!(screen.controller.state(), CycleState::FullOpacityPause);
    }

    #[test]
    fn target_switch_rebuilds_for_the_new_pair() {
        let mut screen = screen();
        let total = screen.controller.pause_duration()
            + screen.controller.step_duration() * screen.graph.sources.len() as u32;
        let events = screen.controller.tick(total);
        assert_eq!(screen.on_cycle_events(&events), Effect::Redraw);
        assert_eq!(screen.graph.target, Attribute::ShapedBy);
    }

    #[test]
    fn hover_out_of_range_is_ignored() {
        let mut screen = screen();
        assert_eq!(screen.apply(Command::Hover(99)), Effect::None);
        assert_eq!(screen.apply(Command::Hover(1)), Effect::Redraw);
        assert_eq!(screen.controller.active_highlight(), Some(1));
    }

    #[test]
    fn invalid_colour_does_not_redraw() {
        let mut screen = screen();
        let command = Command::Color(Attribute::Tenure, "0-5".into(), "#ZZZZZZ".into());
        assert_eq!(screen.apply(command), Effect::None);
        assert_eq!(screen.settings.color_for(Attribute::Tenure, "0-5"), "#0080D0");
    }

    #[test]
    fn data_toggle_and_reset_request_reloads() {
        let mut screen = screen();
        assert_eq!(screen.apply(Command::Data), Effect::Reload);
        assert_eq!(screen.settings.data_source, DataSource::Test);
        assert_eq!(screen.apply(Command::Reset), Effect::Reload);
        assert_eq!(screen.settings.data_source, DataSource::Live);
        assert_eq!(screen.apply(Command::Reset), Effect::Redraw);
    }

    #[test]
    fn quotes_rotate_and_wrap() {
        let mut screen = screen();
        let quote = |text: &str| ApprovedQuote {
            text: text.to_string(),
            first_name: "Theo".to_string(),
            last_name: None,
            is_anonymous: false,
        };
        screen.set_quotes(vec![quote("one"), quote("two")]);
        assert!(screen.rotate_quote());
        assert_eq!(screen.current_quote().unwrap().text, "two");
        assert!(screen.rotate_quote());
        assert_eq!(screen.current_quote().unwrap().text, "one");

        screen.set_quotes(vec![quote("solo")]);
        assert!(!screen.rotate_quote());
    }

    #[test]
    fn renders_the_current_mode() {
        let mut screen = screen();
        assert!(screen.render().contains(r#"class="links""#));
        screen.apply(Command::Mode(Mode::Chord));
        assert!(screen.render().contains(r#"class="ribbons""#));
    }
}
