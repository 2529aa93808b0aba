use f2b_control::config::{AppConfig, ConfigOverrides};
use f2b_control::services::api_client::ApiClient;

fn main() {
    env_logger::init();

    let overrides = ConfigOverrides {
        api_url: std::env::args().nth(1),
        no_update_check: true,
    };
    let config = match AppConfig::load(None, &overrides) {
        Ok(config) => config,
        Err(e) => {
            println!("✗ Invalid configuration: {}", e);
            return;
        }
    };

    println!("Testing f2b-control against {}...", config.api_url);

    let client = match ApiClient::new(&config.api_url, config.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            println!("✗ Cannot build client: {}", e);
            return;
        }
    };

    let info = client.load_server_info();
    if info.version.is_empty() {
        println!("✗ Server version unavailable");
    } else {
        println!("✓ fail2ban {} (log level {}, db {})", info.version, info.log_level_raw, info.db_file);
    }

    match client.global_status() {
        Ok(status) => {
            println!("✓ Found {} jails: {:?}", status.jails, status.list);

            for jail in &status.list {
                match client.jail_status(jail) {
                    Ok(jail_status) => {
                        println!(
                            "  - {}: {} banned, {} failed, {} files",
                            jail,
                            jail_status.actions.currently_banned,
                            jail_status.filter.currently_failed,
                            jail_status.filter.file_list.len()
                        );
                    },
                    Err(e) => {
                        println!("  - {}: Error getting status: {}", jail, e);
                    }
                }
            }
        },
        Err(e) => {
            println!("✗ Failed to get status: {}", e);
        }
    }

    match client.banned() {
        Ok(banned) => println!("✓ {} addresses banned overall", banned.count),
        Err(e) => println!("✗ Failed to get banned summary: {}", e),
    }

    println!("Integration test complete!");
}
