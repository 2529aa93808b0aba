use f2b_control::config::{AppConfig, ConfigOverrides};
use f2b_control::services::api_client::ApiClient;

fn banned_in(client: &ApiClient, jail: &str) -> Option<Vec<String>> {
    match client.jail_status(jail) {
        Ok(status) => Some(status.actions.banned_ip_list),
        Err(e) => {
            println!("✗ Failed to get banned IPs: {}", e);
            None
        }
    }
}

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

    println!("Testing f2b-control IP management against {}...", client.base_url());

    let jails = match client.jails() {
        Ok(jails) => {
            println!("✓ Found jails: {:?}", jails);
            jails
        },
        Err(e) => {
            println!("✗ Failed to get jails: {}", e);
            return;
        }
    };

    if jails.is_empty() {
        println!("No jails found - cannot test IP management");
        return;
    }

    let test_jail = &jails[0];
    // TEST-NET-3, never routed
    let test_ip = "203.0.113.254";

    println!("\nRejecting a malformed address without a request...");
    match client.ban(test_jail, "203.0.113.999") {
        Ok(_) => println!("✗ Malformed address was accepted"),
        Err(e) => println!("✓ Rejected: {}", e),
    }

    println!("\nTesting IP management with jail '{}' and IP '{}'", test_jail, test_ip);
    if let Some(banned) = banned_in(&client, test_jail) {
        println!("✓ Currently banned IPs in {}: {} IPs", test_jail, banned.len());
        for ip in &banned {
            println!("  - {}", ip);
        }
    }

    println!("\nTesting IP banning...");
    match client.ban(test_jail, test_ip) {
        Ok(_) => {
            println!("✓ Successfully banned IP {} in jail {}", test_ip, test_jail);

            if let Some(banned) = banned_in(&client, test_jail) {
                if banned.iter().any(|ip| ip == test_ip) {
                    println!("✓ IP {} confirmed in banned list", test_ip);
                } else {
                    println!("⚠ IP {} not found in banned list (might be ignored by the jail)", test_ip);
                }
            }

            println!("\nTesting IP unbanning...");
            match client.unban(test_jail, test_ip) {
                Ok(_) => println!("✓ Successfully unbanned IP {} from jail {}", test_ip, test_jail),
                Err(e) => println!("✗ Failed to unban IP {}: {}", test_ip, e),
            }
        },
        Err(e) => {
            println!("✗ Failed to ban IP {}: {}", test_ip, e);
        }
    }

    println!("IP management test complete!");
}
