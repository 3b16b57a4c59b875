//! Example: uniform random exploration against the mock arm

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use reach_rl_env::mock::MockArm;
use reach_rl_env::{
    ContinuousSpace, Environment, ReachEnv, ReachEnvConfig, TrackedEnvironment, ACTION_DIM,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => ReachEnvConfig::from_json_file(path).await?,
        None => ReachEnvConfig {
            seed: Some(7),
            ..ReachEnvConfig::default()
        },
    };
    // random actions rarely finish an episode on their own
    config.max_episode_steps.get_or_insert(200);

    let space = ContinuousSpace::symmetric(ACTION_DIM, config.action_limit);
    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_default());

    let (arm, interfaces) = MockArm::connect();
    let env = ReachEnv::new(config, interfaces).await?;
    let mut env = TrackedEnvironment::new(env.time_limited());

    let num_episodes = 5;
    for episode in 0..num_episodes {
        env.reset().await?;
        loop {
            let step = env.step(space.sample_with(&mut rng)).await?;
            if step.done || step.truncated {
                println!(
                    "Episode {}: steps = {}, final distance = {:.3}, collision = {}",
                    episode + 1,
                    env.step_count,
                    step.info.get_f64("distance").unwrap_or(f64::NAN),
                    step.info.get_bool("collision").unwrap_or(false),
                );
                break;
            }
        }
    }

    env.close().await?;

    if let Some(mean) = env.mean_return() {
        println!("\nAverage return over {num_episodes} episodes: {mean:.3}");
    }
    println!("Joint commands sent: {}", arm.commands().len());

    Ok(())
}
