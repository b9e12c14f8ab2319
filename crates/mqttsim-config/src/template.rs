//! Template-variable closure checking (spec §4.2): every `{name}`
//! occurrence in `topic` or a string-valued payload position must equal
//! the stream's expansion variable (or there must be none, if the
//! stream has no `expand`).

use mqttsim_types::{ConfigError, Expansion, Generator, PayloadSpec};

/// Extract the variable names referenced by `{name}`-style placeholders,
/// respecting the doubled-brace escape convention (`{{`/`}}` are literal).
pub fn extract_vars(s: &str) -> Result<Vec<String>, String> {
    let mut vars = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                i += 2;
            }
            '{' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(format!("unterminated '{{' in template '{s}'"));
                }
                let name: String = chars[start..j].iter().collect();
                vars.push(name);
                i = j + 1;
            }
            '}' => {
                return Err(format!("unmatched '}}' in template '{s}'"));
            }
            _ => i += 1,
        }
    }
    Ok(vars)
}

fn collect_payload_strings(payload: &PayloadSpec) -> Vec<String> {
    let mut out = Vec::new();
    match payload {
        PayloadSpec::Text { value } => out.push(value.clone()),
        PayloadSpec::Bytes { value, .. } => out.push(value.clone()),
        PayloadSpec::File { path } | PayloadSpec::PickleFile { path } => out.push(path.clone()),
        PayloadSpec::Sequence { items, .. } => {
            for item in items {
                if let Some(s) = item.as_str() {
                    out.push(s.to_string());
                }
            }
        }
        PayloadSpec::JsonFields { fields } => {
            for f in fields {
                out.extend(collect_generator_strings(&f.generator));
            }
        }
    }
    out
}

fn collect_generator_strings(generator: &Generator) -> Vec<String> {
    match generator {
        Generator::Const {
            value: mqttsim_types::Value::Str(s),
        } => vec![s.clone()],
        Generator::Expression { expression } => vec![expression.clone()],
        _ => Vec::new(),
    }
}

pub fn check_closure(
    topic: &str,
    payload: &PayloadSpec,
    expand: Option<&Expansion>,
    pointer: &str,
) -> Result<(), ConfigError> {
    let expand_var = expand.map(|e| match e {
        Expansion::Range { var, .. } => var.as_str(),
        Expansion::List { var, .. } => var.as_str(),
    });

    let mut strings = vec![topic.to_string()];
    strings.extend(collect_payload_strings(payload));

    for s in &strings {
        let vars = extract_vars(s).map_err(|e| ConfigError::new(pointer, e))?;
        for v in vars {
            if Some(v.as_str()) != expand_var {
                return Err(ConfigError::new(
                    pointer,
                    format!("Missing template variable '{v}' in stream template."),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_var() {
        assert_eq!(extract_vars("devices/{id}/status").unwrap(), vec!["id"]);
    }

    #[test]
    fn handles_escaped_braces() {
        assert_eq!(
            extract_vars("literal {{brace}} and {id}").unwrap(),
            vec!["id"]
        );
    }

    #[test]
    fn no_vars_is_fine() {
        assert!(extract_vars("no vars here").unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_variable() {
        let payload = PayloadSpec::Text {
            value: "hello-{id}".to_string(),
        };
        let err = check_closure("topic/{id}", &payload, None, "streams[0]").unwrap_err();
        assert!(err.message.contains("Missing template variable"));
    }

    #[test]
    fn accepts_matching_variable() {
        let payload = PayloadSpec::Text {
            value: "hello-{id}".to_string(),
        };
        let expand = Expansion::Range {
            var: "id".to_string(),
            start: 1,
            stop: 3,
            step: 1,
            inclusive: true,
        };
        assert!(check_closure("topic/{id}", &payload, Some(&expand), "streams[0]").is_ok());
    }
}
