use clap::Parser;
use client::config::{Args, SessionParams};
use client::input::InputManager;
use client::network::Client;
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;

fn window_conf() -> Conf {
    // Parsing twice is harmless; a bad command line is reported from main.
    let (width, height) = Args::try_parse()
        .map(|args| (args.width, args.height))
        .unwrap_or((1000, 640));

    Conf {
        window_title: "Snake".to_owned(),
        window_width: width,
        window_height: height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let params = match SessionParams::from_args(&args) {
        Ok(params) => params,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let _guard = runtime.enter();

    info!("Starting client...");
    info!("Joining game {} as {}", params.game_id, params.user_id);
    info!("Controls: arrows/WASD to steer, R to toggle ready, 1-4 power-ups, 5/Space to revive");

    let mut client = Client::open(&params);
    let mut snapshots = client.subscribe();
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new();

    loop {
        client.pump();

        if is_key_pressed(KeyCode::Escape) {
            info!("Escape pressed, leaving the game");
            break;
        }

        let snapshot = snapshots.borrow_and_update().clone();
        for intent in input_manager.poll(snapshot.phase, snapshot.dead_countdown) {
            if let Err(e) = client.submit(intent.clone()) {
                warn!("Could not submit {:?}: {}", intent, e);
            }
        }

        let now_ms = (get_time() * 1000.0) as u64;
        renderer.render(&snapshot, client.status(), now_ms);

        next_frame().await;
    }

    client.close();
}
