use std::time::{Duration, Instant};

use f2b_control::config::{AppConfig, ConfigOverrides};
use f2b_control::services::api_client::ApiClient;
use f2b_control::services::file_tail::TailViewer;
use f2b_control::services::local_store::TailPreferences;

fn main() {
    env_logger::init();

    let overrides = ConfigOverrides {
        api_url: std::env::args().nth(1),
        no_update_check: true,
    };
    let client = match AppConfig::load(None, &overrides)
        .and_then(|config| ApiClient::new(&config.api_url, config.request_timeout()))
    {
        Ok(client) => client,
        Err(e) => {
            println!("✗ {}", e);
            return;
        }
    };

    println!("Testing f2b-control log tail against {}...", client.base_url());

    let jails = match client.jails() {
        Ok(jails) => jails,
        Err(e) => {
            println!("✗ Failed to get jails: {}", e);
            return;
        }
    };

    let file = jails.iter().find_map(|jail| {
        client
            .jail_status(jail)
            .ok()?
            .filter
            .file_list
            .into_iter()
            .find(|f| f.exists)
            .map(|f| (jail.clone(), f.path))
    });
    let Some((jail, path)) = file else {
        println!("No jail has an existing log file - cannot test tailing");
        return;
    };
    println!("✓ Using {} from jail {}", path, jail);

    let prefs = TailPreferences {
        tail_mode: true,
        tail_lines: 5,
        poll_interval_secs: 1,
    };
    let mut viewer = TailViewer::new(prefs);
    let start = Instant::now();
    viewer.open(&path, start);

    for round in 0..3 {
        let now = start + Duration::from_secs(round);
        if viewer.poll(&client, now) {
            println!("✓ Fetch {}: {} lines", round + 1, viewer.lines().len());
            for line in viewer.lines() {
                println!("    {}", line);
            }
        } else if let Some(error) = viewer.last_error() {
            println!("✗ Fetch {} failed: {}", round + 1, error);
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    match client.file(&path, 0) {
        Ok(content) => println!("✓ Whole file: {} lines", content.text_lines().len()),
        Err(e) => println!("✗ Whole file read failed: {}", e),
    }

    viewer.close();
    println!("Log tail test complete!");
}
