fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub category: &'a str,
    pub item: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

pub fn format_line(event: &WarnEvent<'_>) -> String {
    format!(
        "MODERACAO_WARN code={} stage={} category={} item={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.category),
        sanitize_value(event.item),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: &WarnEvent<'_>) {
    eprintln!("{}", format_line(event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn line_fills_missing_fields_with_na() {
        let line = format_line(&WarnEvent {
            code: "MALFORMED_SIDECAR",
            stage: "reconcile",
            item: "2024-01-01_10-00-00_abc12345",
            ..WarnEvent::default()
        });
        assert_eq!(
            line,
            "MODERACAO_WARN code=MALFORMED_SIDECAR stage=reconcile category=na item=2024-01-01_10-00-00_abc12345 reason=na err=na"
        );
    }
}
