//! Prints what winterop can see about the current process and machine.
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use winterop::authorization::Token;
use winterop::dxgi::Factory;
use winterop::fs::{
    drive_type, get_system_directory, get_temp_directory, logical_drive_strings,
    volume_information,
};
use winterop::gdi::{display_devices, display_settings, DisplaySettingsMode};
use winterop::prelude::*;
use winterop::process::{current_process, memory_info};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    println!("=== Process ===");
    println!("pid:            {}", current_pid());
    let counters = memory_info(current_process())?;
    println!("working set:    {} KiB", counters.working_set_size / 1024);
    println!(
        "executable:     {}",
        ModuleInstance::current()?.file_name()?.display()
    );

    println!("\n=== Token ===");
    let token = Token::current_process()?;
    let user = token.user_sid()?;
    match user.lookup_account() {
        Ok(account) => println!("user:           {}\\{} ({user})", account.domain, account.name),
        Err(error) => println!("user:           {user} ({error})"),
    }
    println!("elevated:       {}", token.is_elevated()?);
    let enabled = token
        .privileges()?
        .into_iter()
        .filter(|p| p.attributes.is_enabled())
        .count();
    println!("privileges:     {enabled} enabled");

    println!("\n=== File system ===");
    println!("system dir:     {}", get_system_directory()?.display());
    println!("temp dir:       {}", get_temp_directory()?.display());
    for root in logical_drive_strings()? {
        let kind = drive_type(&root);
        match volume_information(&root) {
            Ok(volume) => println!(
                "{root:<4} {kind:?} {} '{}'",
                volume.file_system_name, volume.volume_name
            ),
            Err(error) => println!("{root:<4} {kind:?} ({error})"),
        }
    }

    println!("\n=== Displays ===");
    for device in display_devices(None)?
        .into_iter()
        .filter(|d| d.is_attached_to_desktop())
    {
        let modes = display_settings(Some(&device.name), DisplaySettingsMode::Current)?;
        for mode in modes {
            println!(
                "{} {}x{} @ {} Hz{}",
                device.name,
                mode.width,
                mode.height,
                mode.frequency,
                if device.is_primary() { " (primary)" } else { "" }
            );
        }
    }

    println!("\n=== DXGI ===");
    match Factory::new() {
        Ok(factory) => {
            for adapter in factory.adapters()? {
                let desc = adapter.desc()?;
                println!(
                    "{} [{:04x}:{:04x}] {} MiB{}",
                    desc.description,
                    desc.vendor_id,
                    desc.device_id,
                    desc.dedicated_video_memory / (1024 * 1024),
                    if adapter.is_software()? { " (software)" } else { "" }
                );
                for output in adapter.outputs()? {
                    let out = output.desc()?;
                    println!("  {} {:?}", out.device_name, out.rotation);
                }
            }
        }
        Err(error) => tracing::warn!(%error, "DXGI unavailable"),
    }

    Ok(())
}
