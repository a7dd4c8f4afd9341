//! Job script templates.

use serde::Serialize;
use tinytemplate::{TinyTemplate, format_unescaped};

/// PBS job script for the arthur cluster.
pub static ARTHUR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/data/templates/arthur.txt"
));

/// SLURM job script for the linux cluster.
pub static LINUXCLUSTER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/data/templates/linuxcluster.txt"
));

/// Render `template` with `context`.
///
/// Values are inserted verbatim; shell scripts must not be HTML-escaped.
pub fn render<C: Serialize>(
    name: &str,
    template: &str,
    context: &C,
) -> Result<String, tinytemplate::error::Error> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)?;
    tt.render(name, context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Context {
        value: String,
    }

    #[test]
    fn test_render_is_unescaped() {
        let out = render(
            "t",
            "a={value} b=$\\{USER}",
            &Context {
                value: "\"x\" && <y>".to_string(),
            },
        )
        .unwrap();
        assert_eq!(out, "a=\"x\" && <y> b=${USER}");
    }
}
