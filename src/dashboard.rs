// 🖥️ HTML Dashboard
// Server-side rendering of a StatementReport

use std::fmt::Write;

use crate::analyze::StatementReport;
use crate::transaction::Transaction;

const STYLE: &str = r#"
body { font-family: -apple-system, Segoe UI, Roboto, sans-serif; margin: 0; background: #f5f6fa; color: #222; }
header { background: #1f2a44; color: #fff; padding: 16px 32px; }
header a { color: #9fc3ff; }
main { padding: 24px 32px; }
.cards { display: flex; gap: 16px; flex-wrap: wrap; margin-bottom: 24px; }
.card { background: #fff; border-radius: 8px; padding: 16px 24px; min-width: 200px; box-shadow: 0 1px 3px rgba(0,0,0,.1); }
.card .label { font-size: 13px; color: #666; text-transform: uppercase; }
.card .value { font-size: 26px; font-weight: 600; margin-top: 4px; }
table { border-collapse: collapse; width: 100%; background: #fff; margin-bottom: 24px; }
th, td { padding: 8px 12px; border-bottom: 1px solid #eee; text-align: left; font-size: 14px; }
th { background: #fafafa; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
.bar { background: #4c7cf3; height: 10px; border-radius: 5px; }
.meta { color: #666; font-size: 13px; }
.error { background: #fff; border-left: 4px solid #d64545; padding: 16px 24px; }
"#;

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Format money with two decimals and thousands separators ("12,345.60")
pub fn format_money(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n\
         <header><h1>{}</h1><a href=\"/\">Analyze another statement</a></header>\n\
         <main>\n{}</main>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        escape_html(title),
        body
    )
}

/// Render the generic error page
pub fn render_error(message: &str) -> String {
    let body = format!(
        "<div class=\"error\"><h2>Could not analyze the statement</h2><p>{}</p></div>\n",
        escape_html(message)
    );
    page("Statement Dashboard", &body)
}

fn card(out: &mut String, label: &str, value: &str) {
    let _ = write!(
        out,
        "<div class=\"card\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
        escape_html(label),
        escape_html(value)
    );
}

fn transaction_row(out: &mut String, tx: &Transaction) {
    let _ = writeln!(
        out,
        "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td><td>{}</td></tr>",
        escape_html(&tx.date),
        escape_html(&tx.description),
        format_money(if tx.is_debit() { tx.amount } else { -tx.amount }),
        escape_html(&tx.category)
    );
}

/// Render the dashboard page for an analyzed statement
pub fn render_dashboard(report: &StatementReport) -> String {
    let summary = &report.summary;
    let mut body = String::new();

    let _ = write!(
        body,
        "<p class=\"meta\">{} &middot; {} &middot; extracted as {}",
        escape_html(&report.source_file),
        escape_html(report.bank.name()),
        escape_html(report.mode.name())
    );
    if let (Some(start), Some(end)) = (summary.period_start, summary.period_end) {
        let _ = write!(
            body,
            " &middot; {} to {}",
            start.format("%d %b %Y"),
            end.format("%d %b %Y")
        );
    }
    body.push_str("</p>\n");

    body.push_str("<section class=\"cards\">");
    card(&mut body, "Total Spend", &format_money(summary.total_spend));
    card(&mut body, "Transactions", &summary.total_transactions.to_string());
    card(
        &mut body,
        "Top Category",
        summary.top_category.as_deref().unwrap_or("-"),
    );
    if summary.credit_count > 0 {
        card(&mut body, "Received", &format_money(summary.total_received));
    }
    body.push_str("</section>\n");

    if summary.is_empty() {
        body.push_str("<p>No spending transactions were found in this statement.</p>\n");
        return page("Statement Dashboard", &body);
    }

    body.push_str("<h2>Spending by category</h2>\n<table>\n");
    body.push_str("<tr><th>Category</th><th>Transactions</th><th class=\"num\">Amount</th><th>Share</th></tr>\n");
    for cat in &summary.category_summary {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td>\
             <td><div class=\"bar\" style=\"width: {:.1}%\"></div> {:.1}%</td></tr>",
            escape_html(&cat.category),
            cat.count,
            format_money(cat.total),
            cat.share.clamp(0.0, 100.0),
            cat.share
        );
    }
    body.push_str("</table>\n");

    body.push_str("<h2>Transactions</h2>\n<table>\n");
    body.push_str("<tr><th>Transaction Date</th><th>Description/Narration</th><th class=\"num\">Amount</th><th>Category</th></tr>\n");
    for tx in &report.transactions {
        transaction_row(&mut body, tx);
    }
    body.push_str("</table>\n");

    page("Statement Dashboard", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::StatementAnalyzer;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(250.5), "250.50");
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(-1200.0), "-1,200.00");
    }

    #[test]
    fn test_render_error_escapes_message() {
        let html = render_error("bad <file>");
        assert!(html.contains("bad &lt;file&gt;"));
        assert!(html.contains("Could not analyze"));
    }

    #[test]
    fn test_render_dashboard() {
        let csv = "Date,Narration,Debit,Credit,Balance\n\
                   01/04/2024,UPI/SWIGGY <order>,250.00,,9750.00\n\
                   02/04/2024,UBER TRIP,180.00,,9570.00\n";
        let report = StatementAnalyzer::default()
            .analyze_bytes(csv.as_bytes(), "stmt.csv")
            .unwrap();
        let html = render_dashboard(&report);

        assert!(html.contains("Total Spend"));
        assert!(html.contains("430.00"));
        assert!(html.contains("Food"));
        assert!(html.contains("Travel"));
        assert!(html.contains("UPI/SWIGGY &lt;order&gt;"));
        assert!(!html.contains("<order>"));
        assert!(html.contains("01 Apr 2024 to 02 Apr 2024"));
    }

    #[test]
    fn test_render_empty_dashboard() {
        let csv = "Date,Narration,Debit,Credit\n01/04/2024,SALARY,,5000.00\n";
        let report = StatementAnalyzer::default()
            .analyze_bytes(csv.as_bytes(), "stmt.csv")
            .unwrap();
        let html = render_dashboard(&report);
        assert!(html.contains("No spending transactions"));
        assert!(html.contains("Received"));
    }
}
