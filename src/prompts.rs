//! Prompt Templates
//!
//! Named-variable substitution over the two prompts the pipeline sends to the
//! model. Placeholders are `{name}`; `{{` and `}}` render as literal braces.

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex");
}

pub const USER_QUESTION: &str = "user_question";
pub const DDL_STATEMENTS: &str = "ddl_statements";
pub const SQL_QUERY: &str = "sql_query";

pub const GENERATION_TEMPLATE: &str = r#"
<|begin_of_text|><|start_header_id|>user<|end_header_id|>

Generate a SQL query to answer this question: `{user_question}`
If the question does not match any existing tables or columns, return the word 'error' without generating a SQL query.

DDL statements:
{ddl_statements}<|eot_id|><|start_header_id|>assistant<|end_header_id|>

The following SQL query best answers the question `{user_question}`:
"#;

pub const VERIFICATION_TEMPLATE: &str = r#"
<|begin_of_text|><|start_header_id|>user<|end_header_id|>

Verify if this SQL query correctly answers the question: {user_question}.
SQL query: {sql_query}
If yes, return the same query. If not return corrected query.

DDL statements:
{ddl_statements}<|eot_id|><|start_header_id|>assistant<|end_header_id|>

The following SQL query best answers the question `{user_question}`:
```sql
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Build a template, checking that its placeholders are exactly the
    /// declared input variables.
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Result<Self> {
        let template = template.into();
        let found = placeholders(&template);
        let declared: BTreeSet<String> = input_variables.iter().map(|v| v.to_string()).collect();

        let undeclared: Vec<&String> = found.difference(&declared).collect();
        if !undeclared.is_empty() {
            return Err(Error::Prompt(format!(
                "Template uses undeclared placeholders: {:?}",
                undeclared
            )));
        }
        let unused: Vec<&String> = declared.difference(&found).collect();
        if !unused.is_empty() {
            return Err(Error::Prompt(format!(
                "Declared input variables never appear in template: {:?}",
                unused
            )));
        }

        Ok(Self {
            template,
            input_variables: declared.into_iter().collect(),
        })
    }

    pub fn generation() -> Result<Self> {
        Self::new(GENERATION_TEMPLATE, &[USER_QUESTION, DDL_STATEMENTS])
    }

    pub fn verification() -> Result<Self> {
        Self::new(VERIFICATION_TEMPLATE, &[USER_QUESTION, SQL_QUERY, DDL_STATEMENTS])
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Substitute every placeholder. Values are inserted as-is and never
    /// re-expanded. Extra variables are ignored.
    pub fn render(&self, vars: &HashMap<&str, &str>) -> Result<String> {
        let missing: Vec<&str> = self
            .input_variables
            .iter()
            .map(String::as_str)
            .filter(|name| !vars.contains_key(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Prompt(format!(
                "Missing input variables: {}",
                missing.join(", ")
            )));
        }

        let mut rendered = String::with_capacity(self.template.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(&self.template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            rendered.push_str(&self.template[last..whole.start()]);
            match caps.get(1) {
                Some(name) => rendered.push_str(vars[name.as_str()]),
                None => rendered.push_str(&whole.as_str()[..1]),
            }
            last = whole.end();
        }
        rendered.push_str(&self.template[last..]);

        Ok(rendered)
    }
}

fn placeholders(template: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
