//! Prompt assembly.
//!
//! Builds the exact text sent to a completion provider: task framing,
//! a serialized schema snapshot, optional integration context blocks,
//! the sanitized question, and a fixed rules/output-format footer.
//! Assembly is deterministic so the pipeline stays testable.

use crate::types::SchemaSnapshot;
use chrono::{NaiveDate, Utc};
use std::fmt::Write;

const OUTPUT_FORMAT: &str = r#"RULES:
1. Generate ONLY SELECT queries (read-only)
2. NEVER use DELETE, UPDATE, INSERT, DROP, ALTER, TRUNCATE
3. Always add LIMIT clause (max 1000 rows unless aggregating)
4. Use proper table prefixes as shown in schema
5. Handle NULL values appropriately with COALESCE or IFNULL
6. Use readable column aliases for clarity
7. For date comparisons, use the database's current timezone
8. For aggregations, use appropriate GROUP BY clauses

OUTPUT FORMAT:
Return ONLY a valid JSON object with these exact fields:
{
    "sql": "YOUR SQL QUERY HERE",
    "explanation": "Brief explanation of what this query does",
    "columns": ["list", "of", "result", "columns"],
    "chartType": "table|bar|line|pie|none"
}

Choose chartType based on the data:
- "table" for detailed records or lists
- "bar" for comparing categories
- "line" for time series data
- "pie" for showing proportions
- "none" for single values

Do not include any text outside the JSON object."#;

pub struct PromptAssembler {
    table_prefix: String,
    timezone: String,
    current_date: NaiveDate,
}

impl PromptAssembler {
    pub fn new(table_prefix: &str, timezone: &str) -> Self {
        Self {
            table_prefix: table_prefix.to_string(),
            timezone: timezone.to_string(),
            current_date: Utc::now().date_naive(),
        }
    }

    /// Pins the date stamped into the task framing. Tests use this to keep
    /// the assembled prompt byte-stable.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.current_date = date;
        self
    }

    /// Assembles the full prompt. Same inputs produce the same text.
    pub fn build(
        &self,
        question: &str,
        schema: &SchemaSnapshot,
        integrations: &[String],
    ) -> String {
        let mut parts = vec![self.task_framing(), self.format_schema(schema)];

        let context = self.integration_context(integrations);
        if !context.is_empty() {
            parts.push(context);
        }

        parts.push(format!("USER QUESTION: {question}"));
        parts.push(OUTPUT_FORMAT.to_string());

        parts.join("\n\n")
    }

    fn task_framing(&self) -> String {
        format!(
            "You are a SQL query generator for a MySQL-compatible database.\n\
             Table prefix: {}\n\
             Current date: {}\n\
             Timezone: {}",
            self.table_prefix,
            self.current_date.format("%Y-%m-%d"),
            self.timezone
        )
    }

    fn format_schema(&self, schema: &SchemaSnapshot) -> String {
        let mut out = String::from("DATABASE SCHEMA:");

        for table in &schema.tables {
            let desc = if table.description.is_empty() {
                String::new()
            } else {
                format!(" -- {}", table.description)
            };
            let count = if table.row_count > 0 {
                format!(" (~{} rows)", table.row_count)
            } else {
                String::new()
            };

            let _ = write!(out, "\n\n{}{desc}{count}", table.name);

            for col in &table.columns {
                let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
                let key = if col.key.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", col.key)
                };
                let _ = write!(out, "\n  - {} ({}, {nullable}){key}", col.name, col.sql_type);
            }
        }

        out
    }

    fn integration_context(&self, integrations: &[String]) -> String {
        let mut blocks = Vec::new();

        for name in integrations {
            match name.as_str() {
                "woocommerce" => blocks.push(self.woocommerce_context(true)),
                "woocommerce-legacy" => blocks.push(self.woocommerce_context(false)),
                "learndash" => blocks.push(self.learndash_context()),
                "memberpress" => blocks.push(self.memberpress_context()),
                _ => {}
            }
        }

        blocks.join("\n\n")
    }

    /// `hpos` picks the order-storage note: the HPOS table layout keeps
    /// orders in their own table, the legacy layout in the posts table.
    fn woocommerce_context(&self, hpos: bool) -> String {
        let prefix = &self.table_prefix;
        let orders_note = if hpos {
            format!("Orders are in {prefix}wc_orders table (HPOS enabled)")
        } else {
            format!("Orders are in {prefix}posts table where post_type='shop_order'")
        };
        format!(
            "WOOCOMMERCE CONTEXT:\n\
             {orders_note}\n\n\
             ORDER STATUSES:\n\
             - wc-pending: Pending payment\n\
             - wc-processing: Processing (paid, not shipped)\n\
             - wc-on-hold: On hold\n\
             - wc-completed: Completed\n\
             - wc-cancelled: Cancelled\n\
             - wc-refunded: Refunded\n\
             - wc-failed: Failed payment\n\n\
             For revenue calculations, use status IN ('wc-completed', 'wc-processing')\n\n\
             KEY RELATIONSHIPS:\n\
             - {prefix}wc_orders: Main order data (id, status, total_amount, customer_id, date_created_gmt)\n\
             - {prefix}woocommerce_order_items: Line items (order_item_id, order_id, order_item_name, order_item_type)\n\
             - {prefix}woocommerce_order_itemmeta: Item details (order_item_id, meta_key, meta_value)\n\
             - {prefix}wc_customer_lookup: Customer data (customer_id, user_id, email, first_name, last_name)"
        )
    }

    fn learndash_context(&self) -> String {
        let prefix = &self.table_prefix;
        format!(
            "LEARNDASH CONTEXT:\n\
             Course content uses posts with custom post types:\n\
             - sfwd-courses: Courses\n\
             - sfwd-lessons: Lessons\n\
             - sfwd-topic: Topics\n\
             - sfwd-quiz: Quizzes\n\n\
             Progress tracking in {prefix}learndash_user_activity:\n\
             - activity_type: 'course', 'lesson', 'topic', 'quiz'\n\
             - activity_status: 0 (not started), 1 (in progress), 2 (completed)\n\
             - activity_started, activity_completed: timestamps\n\n\
             COMMON CALCULATIONS:\n\
             - Completion rate: COUNT(activity_status=2) / COUNT(*) WHERE activity_type='course'\n\
             - Average quiz score: From {prefix}learndash_pro_quiz_statistic"
        )
    }

    fn memberpress_context(&self) -> String {
        let prefix = &self.table_prefix;
        format!(
            "MEMBERPRESS CONTEXT:\n\
             Membership products are in posts where post_type='memberpressproduct'\n\n\
             KEY TABLES:\n\
             - {prefix}mepr_transactions: Payment records (id, user_id, product_id, amount, status, created_at)\n\
             - {prefix}mepr_subscriptions: Recurring subscriptions (id, user_id, product_id, status, created_at)\n\n\
             TRANSACTION STATUSES: pending, complete, refunded, failed\n\
             SUBSCRIPTION STATUSES: active, suspended, cancelled, expired\n\n\
             COMMON CALCULATIONS:\n\
             - MRR: SUM(amount) from active subscriptions / billing periods\n\
             - Churn rate: Cancelled in period / Active at start of period"
        )
    }
}
