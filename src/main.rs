use clap::{Args, Parser, Subcommand};
use gridmdp::config::Config;
use gridmdp::envs::grid_world::{
    standard_grid, standard_sticky_grid, Action, Cell, Dynamics, GridWorld,
};
use gridmdp::envs::render::{render_policy, render_values};
use gridmdp::mdps::episode::{EpisodeOptions, Start};
use gridmdp::mdps::mdp::Mdp;
use gridmdp::mdps::mdp_simulator::SimulationContext;
use gridmdp::mdps::policy::{argmax_by, DeterministicPolicy, StochasticPolicy};
use gridmdp::mdps::solvers::mc_methods::{ActionValues, MonteCarlo};
use gridmdp::mdps::solvers::policy_iteration::PolicyIteration;
use gridmdp::mdps::solvers::value_iteration::ValueIteration;
use gridmdp::mdps::solvers::MdpSolver;
use gridmdp::mdps::value_table::ValueTable;
use gridmdp::persistence::{save_agent, save_env, AgentSnapshot, PersistDynamics};
use log::info;
use rand::prelude::*;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Dynamic programming and Monte Carlo control on the 3x4 grid world")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Value iteration with in-place sweeps (the default).
    ValueIteration,
    /// Policy iteration from a random initial policy.
    PolicyIteration,
    /// First-visit Monte Carlo prediction of a random fixed policy.
    McPrediction,
    /// Monte Carlo control with exploring starts.
    McExploringStarts,
    /// On-policy Monte Carlo control with an epsilon-soft policy.
    McEpsilonGreedy,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Use the sticky grid: moves succeed with 0.8 and stay put otherwise.
    #[arg(long, global = true)]
    stochastic: bool,

    /// Reward of every ordinary cell.
    #[arg(long, global = true, allow_hyphen_values = true)]
    cost: Option<f64>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// JSON file with hyperparameters; missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    save_agent: Option<PathBuf>,

    #[arg(long, global = true)]
    save_env: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli.common)?;
    let command = cli.command.unwrap_or(Command::ValueIteration);
    info!("running {command:?} with {config:?}");

    if cli.common.stochastic {
        run(&standard_sticky_grid(config.cost), command, &config, &cli.common)
    } else {
        run(&standard_grid(config.cost), command, &config, &cli.common)
    }
}

fn load_config(args: &CommonArgs) -> gridmdp::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(cost) = args.cost {
        config.cost = cost;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;

    Ok(config)
}

fn run<D>(
    gw: &GridWorld<D>,
    command: Command,
    config: &Config,
    args: &CommonArgs,
) -> Result<(), Box<dyn Error>>
where
    D: Dynamics + PersistDynamics,
{
    if let Some(path) = &args.save_env {
        save_env(gw, path)?;
        info!("saved environment to {}", path.display());
    }

    let mut report = Report::default();
    let agent = solve(gw, command, config, &mut report);
    report.print();

    if let Some(path) = &args.save_agent {
        save_agent(&agent, path)?;
        info!("saved agent to {}", path.display());
    }

    Ok(())
}

/// Titled tables of one run, printed once the run is over.
#[derive(Debug, Default)]
struct Report {
    sections: Vec<(String, String)>,
}

impl Report {
    fn values<D>(&mut self, title: &str, gw: &GridWorld<D>, v: &ValueTable<Cell>) {
        self.sections.push((title.to_string(), render_values(gw.grid(), v)));
    }

    fn policy<D>(&mut self, title: &str, gw: &GridWorld<D>, lookup: impl Fn(Cell) -> Option<Action>) {
        self.sections.push((title.to_string(), render_policy(gw.grid(), lookup)));
    }

    fn line(&mut self, text: String) {
        self.sections.push((String::new(), text));
    }

    #[cfg(test)]
    fn titles(&self) -> impl Iterator<Item = &str> + '_ {
        self.sections.iter().map(|(t, _)| t.as_str()).filter(|t| !t.is_empty())
    }

    fn print(&self) {
        for (title, body) in &self.sections {
            if !title.is_empty() {
                println!("{title}:");
            }
            println!("{body}");
        }
    }
}

/// `V(s) = max_a Q(s, a)`, first max on ties.
fn greedy_values<D: Dynamics>(gw: &GridWorld<D>, av: &ActionValues<Cell, Action>) -> ValueTable<Cell> {
    gw.non_terminal_states()
        .into_iter()
        .filter_map(|s| argmax_by(gw.actions(s), |a| av.q.get((s, a))).map(|(_, q)| (s, q)))
        .collect()
}

fn episode_options(config: &Config) -> EpisodeOptions {
    EpisodeOptions {
        max_steps: config.max_steps,
        ..Default::default()
    }
}

fn solve<D: Dynamics>(
    gw: &GridWorld<D>,
    command: Command,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    match command {
        Command::ValueIteration => value_iteration(gw, config, report),
        Command::PolicyIteration => policy_iteration(gw, config, report),
        Command::McPrediction => mc_prediction(gw, config, report),
        Command::McExploringStarts => mc_exploring_starts(gw, config, report),
        Command::McEpsilonGreedy => mc_epsilon_greedy(gw, config, report),
    }
}

fn value_iteration<D: Dynamics>(
    gw: &GridWorld<D>,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    let vi = &mut ValueIteration::new(gw, config.gamma).with_max_sweeps(config.max_sweeps);
    let initial = vi.policy();
    report.values("initial values", gw, vi.values());
    report.policy("initial policy", gw, |c| initial.get(c));

    let (converged, sweeps) = vi.exec(config.theta, None);
    report.line(format!("theta: {}, converged: {converged}, sweeps: {sweeps}", config.theta));

    let vi = &*vi;
    report.values("values", gw, vi.values());
    report.policy("policy", gw, |c| vi.pi_star(c));

    AgentSnapshot::new(config.gamma)
        .with_values(vi.values())
        .with_deterministic_policy(&vi.policy())
}

fn policy_iteration<D: Dynamics>(
    gw: &GridWorld<D>,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    let rng = &mut StdRng::seed_from_u64(config.seed);
    let pi = &mut PolicyIteration::new(gw, config.gamma, DeterministicPolicy::random(gw, rng))
        .with_caps(config.evaluation_iterations, config.policy_iterations);
    report.values("initial values", gw, pi.values());
    report.policy("initial policy", gw, |c| pi.policy().get(c));

    let (stable, rounds) = pi.exec(config.theta, None);
    report.line(format!("theta: {}, policy stable: {stable}, rounds: {rounds}", config.theta));

    report.values("values", gw, pi.values());
    report.policy("policy", gw, |c| pi.policy().get(c));

    AgentSnapshot::new(config.gamma)
        .with_values(pi.values())
        .with_deterministic_policy(pi.policy())
}

fn mc_prediction<D: Dynamics>(
    gw: &GridWorld<D>,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    let ctx = &mut SimulationContext::new(gw.start(), config.seed);
    let policy = DeterministicPolicy::random(gw, ctx.rng());

    let mc = &mut MonteCarlo::new(gw, config.gamma, Start::Fixed(gw.start()))
        .with_options(episode_options(config));
    report.values("initial values", gw, &greedy_values(gw, mc.values()));
    report.policy("initial policy", gw, |c| policy.get(c));

    mc.evaluate(&policy, ctx, config.episodes);
    let v = mc.state_values(&policy, ctx, config.episodes);
    report.values("values", gw, &v);
    report.policy("policy", gw, |c| policy.get(c));

    AgentSnapshot::new(config.gamma)
        .with_values(&v)
        .with_action_values(mc.values())
        .with_deterministic_policy(&policy)
}

fn mc_exploring_starts<D: Dynamics>(
    gw: &GridWorld<D>,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    let ctx = &mut SimulationContext::new(gw.start(), config.seed);
    let policy = &mut DeterministicPolicy::random(gw, ctx.rng());

    let mc = &mut MonteCarlo::new(gw, config.gamma, Start::RandomNonTerminal)
        .with_options(episode_options(config));
    report.values("initial values", gw, &greedy_values(gw, mc.values()));
    report.policy("initial policy", gw, |c| policy.get(c));

    mc.exploring_starts(policy, ctx, config.episodes);

    let v = greedy_values(gw, mc.values());
    report.values("values", gw, &v);
    report.policy("policy", gw, |c| policy.get(c));

    AgentSnapshot::new(config.gamma)
        .with_values(&v)
        .with_action_values(mc.values())
        .with_deterministic_policy(policy)
}

fn mc_epsilon_greedy<D: Dynamics>(
    gw: &GridWorld<D>,
    config: &Config,
    report: &mut Report,
) -> AgentSnapshot<Cell, Action> {
    let ctx = &mut SimulationContext::new(gw.start(), config.seed);
    let initial = DeterministicPolicy::random(gw, ctx.rng());
    let policy = &mut StochasticPolicy::soften(gw, &initial, config.epsilon);

    let mc = &mut MonteCarlo::new(gw, config.gamma, Start::Fixed(gw.start()))
        .with_options(episode_options(config));
    report.values("initial values", gw, &greedy_values(gw, mc.values()));
    report.policy("initial policy", gw, |c| policy.greedy_action(c));

    mc.epsilon_greedy(policy, config.epsilon, ctx, config.episodes);

    let v = greedy_values(gw, mc.values());
    report.values("values", gw, &v);
    report.policy("greedy policy", gw, |c| policy.greedy_action(c));

    AgentSnapshot::new(config.gamma)
        .with_values(&v)
        .with_action_values(mc.values())
        .with_stochastic_policy(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn common_options_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "gridmdp",
            "mc-epsilon-greedy",
            "--stochastic",
            "--cost",
            "-0.09",
            "--seed",
            "7",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Command::McEpsilonGreedy));
        assert!(cli.common.stochastic);
        assert_eq!(cli.common.cost, Some(-0.09));

        let config = load_config(&cli.common).unwrap();
        assert_eq!(config.cost, -0.09);
        assert_eq!(config.seed, 7);
        assert_eq!(config.gamma, 0.9);
    }

    #[rstest]
    #[case(Command::ValueIteration, false)]
    #[case(Command::PolicyIteration, true)]
    #[case(Command::McPrediction, false)]
    #[case(Command::McExploringStarts, false)]
    #[case(Command::McEpsilonGreedy, true)]
    fn every_run_reports_before_and_after(#[case] command: Command, #[case] stochastic: bool) {
        let config = Config {
            episodes: 20,
            ..Default::default()
        };
        let report = &mut Report::default();
        let agent = if stochastic {
            solve(&standard_sticky_grid(config.cost), command, &config, report)
        } else {
            solve(&standard_grid(config.cost), command, &config, report)
        };

        let titles = report.titles().collect::<Vec<_>>();
        let at = |title: &str| titles.iter().position(|t| *t == title);
        assert_eq!(at("initial values"), Some(0), "{titles:?}");
        assert_eq!(at("initial policy"), Some(1), "{titles:?}");
        assert!(at("values") > at("initial policy"), "{titles:?}");
        assert!(titles.last().is_some_and(|t| t.ends_with("policy")), "{titles:?}");
        assert!(agent.policy.is_some());
    }

    #[test]
    fn no_arguments_runs_the_default_batch() {
        let cli = Cli::try_parse_from(["gridmdp"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.common.stochastic);
    }
}
