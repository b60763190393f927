use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use room_world_core::{
    Color as ObjectColor, Direction as Heading, ObjectKind,
    agent::{Agent, PlanningAgent, RandomWalker},
    config::EnvConfig,
    engine::{Action, Tile},
    environment::{Environment, Observation},
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{Level, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON environment configuration (`{"kind": "grid_maze", ...}`)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Environment kind used when no config file is given
    #[arg(short, long, default_value = "grid_maze")]
    env: String,

    /// Override the configured seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Episodes to run in headless mode
    #[arg(long, default_value_t = 10)]
    episodes: usize,

    /// Run without a terminal UI and print a summary
    #[arg(long)]
    headless: bool,

    /// Start the UI with autoplay off
    #[arg(long)]
    manual: bool,

    /// Drive episodes with a random walker instead of the planner
    #[arg(long)]
    random: bool,

    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Log destination in interactive mode (stderr would corrupt the UI)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Autoplay interval in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

impl Args {
    fn agent(&self) -> Box<dyn Agent> {
        if self.random {
            Box::new(RandomWalker::new(self.seed.unwrap_or(0)))
        } else {
            Box::new(PlanningAgent::new())
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(&args)?;
    let config = load_config(&args)?;

    if args.headless {
        return run_batch(&config, &args);
    }

    // Create the application state before touching the terminal so
    // configuration errors print normally
    let mut app = App::new(&config, &args)?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

fn init_logging(args: &Args) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(args.log_level);
    match (&args.log_file, args.headless) {
        (Some(path), _) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        (None, true) => builder.with_writer(io::stderr).init(),
        (None, false) => {}
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<EnvConfig> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            EnvConfig::from_json(&text)
                .with_context(|| format!("Invalid environment config in {}", path.display()))?
        }
        None => EnvConfig::default_for(&args.env).ok_or_else(|| {
            anyhow!(
                "Unknown environment kind '{}' (expected grid_rooms, grid_maze, multi_object or empty_room)",
                args.env
            )
        })?,
    };
    Ok(match args.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    })
}

/// Plays `--episodes` episodes without a UI and prints mean reward and
/// success rate.
fn run_batch(config: &EnvConfig, args: &Args) -> Result<()> {
    let mut env = config.build().context("Failed to build environment")?;
    let mut agent = args.agent();
    let mut total_reward = 0.0;
    let mut successes = 0;

    for episode in 0..args.episodes {
        if let Err(err) = env.generate() {
            warn!(episode, %err, "episode generation failed");
            continue;
        }
        let mut reward = 0.0;
        let mut last = None;
        while !env.is_done() {
            let action = agent.act(&env.view());
            let step = env.step(action);
            reward += step.reward;
            last = Some(step);
        }
        let steps = last.as_ref().map_or(0, |s| s.observation.step_count);
        let success = last.is_some_and(|s| s.reward > 0.0);
        info!(episode, reward, steps, success, "episode finished");

        total_reward += reward;
        successes += usize::from(success);
    }

    let episodes = args.episodes.max(1) as f32;
    println!(
        "episodes={} mean_reward={:.3} success_rate={:.2}",
        args.episodes,
        total_reward / episodes,
        successes as f32 / episodes
    );
    Ok(())
}

struct App {
    /// The environment being played.
    env: Box<dyn Environment>,
    /// Acts on `space` and during autoplay.
    agent: Box<dyn Agent>,
    observation: Observation,
    /// Sum of rewards this episode.
    episode_reward: f32,
    episode: usize,
    autoplay: bool,
    /// Flag to control the main loop.
    should_quit: bool,
    message: String,
}

impl App {
    fn new(config: &EnvConfig, args: &Args) -> Result<Self> {
        let mut env = config.build().context("Failed to build environment")?;
        let observation = env.generate().context("Failed to generate first episode")?;
        Ok(App {
            env,
            agent: args.agent(),
            observation,
            episode_reward: 0.0,
            episode: 1,
            autoplay: !args.manual,
            should_quit: false,
            message: String::new(),
        })
    }

    /// Handles one autoplay tick.
    fn tick(&mut self) {
        if self.autoplay {
            self.agent_step();
        }
    }

    fn agent_step(&mut self) {
        let action = self.agent.act(&self.env.view());
        self.apply(action);
    }

    fn apply(&mut self, action: Action) {
        if self.env.is_done() {
            return;
        }
        let step = self.env.step(action);
        self.episode_reward += step.reward;
        if step.done {
            self.message = format!(
                "Episode {} over: reward {:.3} after {} steps (r to restart)",
                self.episode, self.episode_reward, step.observation.step_count
            );
            info!(episode = self.episode, reward = self.episode_reward, "episode finished");
        }
        self.observation = step.observation;
    }

    fn regenerate(&mut self) {
        match self.env.generate() {
            Ok(observation) => {
                self.observation = observation;
                self.episode += 1;
                self.episode_reward = 0.0;
                self.message.clear();
            }
            Err(err) => {
                warn!(%err, "regeneration failed");
                self.message = format!("Generation failed: {err}");
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Left => self.apply(Action::Left),
            KeyCode::Right => self.apply(Action::Right),
            KeyCode::Up => self.apply(Action::Forward),
            KeyCode::Char('p') => self.apply(Action::Pickup),
            KeyCode::Char('d') => self.apply(Action::Drop),
            KeyCode::Char('t') => self.apply(Action::Toggle),
            KeyCode::Char(' ') => self.agent_step(),
            KeyCode::Char('a') => self.autoplay = !self.autoplay,
            KeyCode::Char('r') => self.regenerate(),
            _ => {}
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        // Draw the UI
        terminal.draw(|f| ui(f, app))?;

        // Calculate timeout for event polling
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // Poll for events (keyboard, mouse, etc.)
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        // Update application state if enough time has passed
        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        // Exit loop if requested
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Area for the map
            Constraint::Percentage(20), // Area for episode status
            Constraint::Percentage(10), // Area for help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new(
        "←/→ turn  ↑ forward  p pickup  d drop  t toggle  space agent  a autoplay  r restart  q quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn color_of(color: ObjectColor) -> Color {
    match color {
        ObjectColor::Red => Color::Red,
        ObjectColor::Green => Color::Green,
        ObjectColor::Blue => Color::Blue,
        ObjectColor::Purple => Color::Magenta,
        ObjectColor::Yellow => Color::Yellow,
        ObjectColor::Grey => Color::Gray,
    }
}

fn object_symbol(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Key => "k",
        ObjectKind::Ball => "o",
        ObjectKind::Box => "b",
        ObjectKind::Goal => "G",
        ObjectKind::Lava => "~",
        ObjectKind::Door => "|",
        ObjectKind::Wall => "#",
    }
}

fn tile_span(tile: &Tile) -> Span<'static> {
    match tile {
        Tile::Floor => Span::raw(" "),
        Tile::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
        Tile::Goal => Span::styled("G", Style::default().fg(Color::Green).bold()),
        Tile::Lava => Span::styled("~", Style::default().fg(Color::Red)),
        Tile::Door {
            color,
            open,
            locked,
        } => {
            let symbol = match (*open, *locked) {
                (true, _) => "+",
                (false, true) => "L",
                (false, false) => "|",
            };
            Span::styled(symbol, Style::default().fg(color_of(*color)))
        }
        Tile::Object(obj) => Span::styled(
            object_symbol(obj.kind),
            Style::default().fg(color_of(obj.color)),
        ),
    }
}

fn agent_span(heading: Heading) -> Span<'static> {
    let arrow = match heading {
        Heading::Right => ">",
        Heading::Down => "v",
        Heading::Left => "<",
        Heading::Up => "^",
    };
    Span::styled(arrow, Style::default().fg(Color::Red).bold())
}

/// Renders the tile grid with the agent on top.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let world = app.env.world();
    let tiles = world.tiles();

    let lines: Vec<Line> = (0..tiles.height())
        .map(|y| {
            let spans: Vec<Span> = tiles
                .row(y)
                .iter()
                .enumerate()
                .map(|(x, tile)| {
                    if world.agent_pos.x == x && world.agent_pos.y == y {
                        agent_span(world.agent_dir)
                    } else {
                        tile_span(tile)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!("Room World: {}", app.env.mission()))
                .borders(Borders::ALL),
        )
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

/// Renders step count, reward, hands and task progress.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let obs = &app.observation;
    let carrying = match obs.carrying {
        Some(obj) => Span::styled(
            format!("{} {}", obj.color.name(), obj.kind.name()),
            Style::default().fg(color_of(obj.color)),
        ),
        None => Span::raw("nothing"),
    };

    let mut items = vec![
        ListItem::from(Line::from(format!(
            "Episode {}  Step {}  Reward {:.3}  Autoplay {}",
            app.episode,
            obs.step_count,
            app.episode_reward,
            if app.autoplay { "on" } else { "off" }
        ))),
        ListItem::from(Line::from(vec![Span::raw("Carrying: "), carrying])),
    ];

    if let Some(task) = &obs.task {
        let flags: String = task
            .available_obj
            .iter()
            .map(|live| if *live { '1' } else { '0' })
            .collect();
        let collected = task
            .collected
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        items.push(ListItem::from(Line::from(format!(
            "Collected this step: {collected}  Available: {flags}"
        ))));
    }
    if !app.message.is_empty() {
        items.push(ListItem::from(Line::styled(
            app.message.clone(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let status_widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status_widget, area);
}
