//! Tier 2 — deterministic keyword heuristics.
//!
//! An ordered decision table over the lowercased original question. The
//! predicates are non-exclusive, so more specific rows must come before the
//! general ones ("average + department + superlative" before "average").
//! One resolver walks the table and the first match wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::dataset::{find_column, Dataset};

static FIRST_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A leading "first N" shape; a bare "first" is usually temporal.
static FIRST_N: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfirst \d+").unwrap());

// These need boundaries: "era" sits inside "average", "genera" inside
// "general", "all" inside "tall".
static TEMPORAL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(era|epoch|genus|genera)\b").unwrap());
static SELECT_ALL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(all|entire|everything)\b").unwrap());

/// Everything a rule needs: the lowercased question and the resolved
/// table/column names.
pub(crate) struct Ctx {
    q: String,
    table: String,
    salary: String,
    department: String,
}

impl Ctx {
    fn new(question: &str, dataset: &Dataset) -> Self {
        Self {
            q: question.to_lowercase(),
            table: dataset.table_name.clone(),
            salary: salary_column(dataset),
            department: department_column(dataset),
        }
    }

    fn has_average(&self) -> bool {
        self.q.contains("average") || self.q.contains("mean ")
    }

    fn has_salary(&self) -> bool {
        ["salary", "salaries", "wage", "pay", "income"].iter().any(|k| self.q.contains(k))
    }

    fn has_department(&self) -> bool {
        self.q.contains("department")
    }

    fn has_superlative(&self) -> bool {
        self.superlative_ascending() || self.superlative_descending()
    }

    fn superlative_descending(&self) -> bool {
        ["highest", "largest", "biggest", "maximum", "most"].iter().any(|k| self.q.contains(k))
    }

    fn superlative_ascending(&self) -> bool {
        ["lowest", "smallest", "minimum", "least"].iter().any(|k| self.q.contains(k))
    }

    fn order_direction(&self) -> &'static str {
        if self.superlative_ascending() { "ASC" } else { "DESC" }
    }

    fn has_count(&self) -> bool {
        self.q.contains("how many") || self.q.contains("count") || self.q.contains("number of")
    }

    fn has_top_n(&self) -> bool {
        self.q.contains("top ") || FIRST_N.is_match(&self.q)
    }

    /// First embedded integer, for "top N" style questions.
    fn embedded_integer(&self) -> Option<usize> {
        FIRST_INTEGER.find(&self.q).and_then(|m| m.as_str().parse().ok())
    }

    fn has_per_group(&self) -> bool {
        self.q.contains("each department")
            || self.q.contains("per department")
            || self.q.contains("by department")
    }

    fn has_select_all(&self) -> bool {
        SELECT_ALL_WORD.is_match(&self.q)
    }

    fn has_temporal_topic(&self) -> bool {
        self.q.contains("fossil") || self.q.contains("geologic") || TEMPORAL_WORD.is_match(&self.q)
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&Ctx) -> bool,
    build: fn(&Ctx) -> String,
}

/// Order is the contract: specific predicates first.
static RULES: &[Rule] = &[
    Rule {
        name: "grouped_average_superlative",
        applies: |c| c.has_average() && c.has_salary() && c.has_department() && c.has_superlative(),
        build: |c| grouped_average_sql(&c.table, &c.department, &c.salary, c.order_direction(), true),
    },
    Rule {
        name: "grouped_average",
        applies: |c| c.has_average() && c.has_salary() && c.has_department(),
        build: |c| grouped_average_sql(&c.table, &c.department, &c.salary, "DESC", false),
    },
    Rule {
        name: "plain_average",
        applies: |c| c.has_average() && c.has_salary(),
        build: |c| format!("SELECT AVG({}) AS avg_salary FROM {}", c.salary, c.table),
    },
    Rule {
        name: "grouped_extreme_salary",
        applies: |c| c.has_superlative() && c.has_salary() && c.has_department(),
        build: |c| {
            let (agg, alias) = if c.superlative_ascending() { ("MIN", "min_salary") } else { ("MAX", "max_salary") };
            format!(
                "SELECT {dept}, {agg}({sal}) AS {alias} FROM {table} GROUP BY {dept} ORDER BY {alias} {dir} LIMIT 1",
                dept = c.department,
                sal = c.salary,
                table = c.table,
                dir = c.order_direction(),
            )
        },
    },
    Rule {
        name: "extreme_salary_row",
        applies: |c| c.has_superlative() && c.has_salary(),
        build: |c| {
            format!(
                "SELECT * FROM {} ORDER BY {} {} LIMIT 1",
                c.table,
                c.salary,
                c.order_direction()
            )
        },
    },
    Rule {
        name: "grouped_count",
        applies: |c| c.has_count() && c.has_department(),
        build: |c| {
            format!(
                "SELECT {dept}, COUNT(*) AS count FROM {table} GROUP BY {dept}",
                dept = c.department,
                table = c.table,
            )
        },
    },
    Rule {
        name: "count_rows",
        applies: Ctx::has_count,
        build: |c| format!("SELECT COUNT(*) AS total_rows FROM {}", c.table),
    },
    Rule {
        name: "top_n",
        applies: Ctx::has_top_n,
        build: |c| format!("SELECT * FROM {} LIMIT {}", c.table, c.embedded_integer().unwrap_or(10)),
    },
    Rule {
        name: "department_statistics",
        applies: Ctx::has_per_group,
        build: |c| {
            format!(
                "SELECT {dept}, COUNT(*) AS count, AVG({sal}) AS avg_salary FROM {table} GROUP BY {dept}",
                dept = c.department,
                sal = c.salary,
                table = c.table,
            )
        },
    },
    Rule {
        name: "select_all",
        applies: Ctx::has_select_all,
        build: |c| format!("SELECT * FROM {}", c.table),
    },
    // Temporal topics fetch the whole table so downstream analysis sees
    // every row, not a projection.
    Rule {
        name: "temporal_full_fetch",
        applies: Ctx::has_temporal_topic,
        build: |c| format!("SELECT * FROM {}", c.table),
    },
];

/// Walk the table; `None` when no predicate matches (the cascade then moves
/// to the contextual tier or a preview).
pub fn from_keywords(question: &str, dataset: &Dataset) -> Option<String> {
    let ctx = Ctx::new(question, dataset);
    RULES.iter().find(|r| (r.applies)(&ctx)).map(|r| {
        tracing::debug!(rule = r.name, "heuristic rule matched");
        (r.build)(&ctx)
    })
}

/// Salary-like column resolved against the schema, defaulting to the
/// literal name.
pub(crate) fn salary_column(dataset: &Dataset) -> String {
    find_column(&dataset.columns, &["salary", "wage", "income"])
        .unwrap_or("salary")
        .to_string()
}

/// Department-like column resolved against the schema.
pub(crate) fn department_column(dataset: &Dataset) -> String {
    find_column(&dataset.columns, &["department", "dept", "division", "team"])
        .unwrap_or("department")
        .to_string()
}

/// Grouped average, optionally restricted to the single extreme group.
/// Shared with the contextual tier, which re-issues it for follow-ups.
pub(crate) fn grouped_average_sql(
    table: &str,
    department: &str,
    salary: &str,
    direction: &str,
    limit_one: bool,
) -> String {
    let limit = if limit_one { " LIMIT 1" } else { "" };
    format!(
        "SELECT {department}, AVG({salary}) AS avg_salary FROM {table} \
         GROUP BY {department} ORDER BY avg_salary {direction}{limit}"
    )
}
