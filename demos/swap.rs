//! Two employees offer shifts on the same day and get them swapped.
//!
//! Run with `cargo run --example swap [config.toml]`.
use shift_trade::{
    EmployeeId, NewShift, ShiftService, ShiftUpdate, TimeSlot, config::ServiceConfig, telemetry,
};
use std::{collections::HashMap, path::Path};

fn main() -> anyhow::Result<()> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::from_file(Path::new(&path))?,
        None => ServiceConfig::default(),
    };
    config.storage.temporary = true;

    telemetry::init_logging(&config.logging)?;

    let service = ShiftService::open(&config)?;

    // stands in for the session gate of the surrounding web service
    let sessions = HashMap::from([
        ("alice-token".to_string(), EmployeeId::new("alice")),
        ("bob-token".to_string(), EmployeeId::new("bob")),
    ]);
    let alice = service.authenticate(&sessions, "alice-token")?;
    let bob = service.authenticate(&sessions, "bob-token")?;

    let early = service.create_shift(
        &alice,
        &NewShift::new()
            .set_date("2024-05-01")
            .set_slot("früh")
            .set_weekday("Mittwoch"),
    )?;
    let late = service.create_shift(
        &bob,
        &NewShift::new()
            .set_date("2024-05-01")
            .set_slot("spät")
            .set_weekday("Mittwoch"),
    )?;

    // bob advertises his late shift and would take an early one
    let offered = service.update_shift(
        &bob,
        &ShiftUpdate::from_shift(&late)
            .set_trade(true)
            .want(TimeSlot::Early),
    )?;
    println!("bob offers {} ({}), trade = {}", offered.id, offered.slot, offered.trade);

    // alice offers her early shift, which bob's offer accepts
    let outcome = service.submit_update(&alice, &ShiftUpdate::from_shift(&early).set_trade(true))?;
    println!("swap happened: {}", outcome.is_swap());

    for owner in [&alice, &bob] {
        for overview in service.list_for_owner(owner)? {
            println!(
                "{owner}: {} {} {} trade={}",
                overview.shift.date, overview.shift.weekday, overview.shift.slot, overview.shift.trade
            );
        }
    }

    Ok(())
}
