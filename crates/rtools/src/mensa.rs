//! `rtools mensa`: print the cafeteria menu.

use miette::{IntoDiagnostic, Result};
use rtools_cli::{MensaArgs, RtoolsConfig};
use rtools_menu::{DEFAULT_MENSA_ID, DEFAULT_URL, DayMenu};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct DishRow<'a> {
    day: &'a str,
    #[tabled(rename = "type")]
    kind: &'a str,
    dish: &'a str,
}

pub async fn run(args: MensaArgs, config: &RtoolsConfig) -> Result<i32> {
    let id = match args.mensa.as_deref().or(config.mensa.default.as_deref()) {
        Some(mensa) => rtools_menu::resolve_mensa_id(mensa).into_diagnostic()?,
        None => DEFAULT_MENSA_ID,
    };
    let template = config.mensa.url.as_deref().unwrap_or(DEFAULT_URL);
    let url = rtools_menu::menu_url(template, id);

    let html = rtools_menu::fetch_page(&url).await.into_diagnostic()?;
    let days = rtools_menu::parse_menu(&html);
    if days.is_empty() {
        tracing::warn!("no menu found on {}", url);
    }

    let shown = if args.all { &days[..] } else { &days[..days.len().min(1)] };
    println!("{}", menu_table(shown));
    Ok(0)
}

fn menu_table(days: &[DayMenu]) -> String {
    let rows = days.iter().flat_map(|day| {
        day.dishes.iter().map(move |dish| DishRow {
            day: &day.day,
            kind: &dish.kind,
            dish: &dish.name,
        })
    });
    Table::new(rows).with(Style::markdown()).to_string()
}
