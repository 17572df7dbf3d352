use chrono::NaiveDate;
use coursehub_db::models::DiscountType;

/// Subject and both bodies of a notification, ready to queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EnrollmentEmail<'a> {
    pub student_name: &'a str,
    pub course_title: &'a str,
    pub batch_number: u32,
    pub start_date: Option<NaiveDate>,
    pub meeting_url: Option<&'a str>,
    pub amount_paid_cents: i64,
    pub currency: &'a str,
    pub dashboard_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct CouponEmail<'a> {
    pub recipient_name: &'a str,
    pub code: &'a str,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub currency: &'a str,
    pub valid_until: Option<NaiveDate>,
    pub course_titles: Vec<&'a str>,
    pub message: Option<&'a str>,
}

pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let amount = format!("{}.{:02}", cents / 100, cents % 100);
    match currency {
        "USD" => format!("{sign}${amount}"),
        "EUR" => format!("{sign}€{amount}"),
        "GBP" => format!("{sign}£{amount}"),
        other => format!("{sign}{amount} {other}"),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl EnrollmentEmail<'_> {
    pub fn render(&self) -> RenderedEmail {
        let subject = format!("You're enrolled: {}", self.course_title);
        let paid = if self.amount_paid_cents == 0 {
            "Free enrollment".to_string()
        } else {
            format!("Amount paid: {}", format_money(self.amount_paid_cents, self.currency))
        };
        let start = self
            .start_date
            .map(|d| format!("Batch {} starts on {}.", self.batch_number, d.format("%B %-d, %Y")))
            .unwrap_or_else(|| format!("You are in batch {}. We'll send the start date soon.", self.batch_number));

        let mut text = format!(
            "Hi {name},\n\nThanks for enrolling in {course}.\n{start}\n{paid}\n",
            name = self.student_name,
            course = self.course_title,
        );
        if let Some(url) = self.meeting_url {
            text.push_str(&format!("Class link: {url}\n"));
        }
        text.push_str(&format!("\nYour courses: {}\n", self.dashboard_url));

        let mut html = format!(
            "<p>Hi {name},</p><p>Thanks for enrolling in <strong>{course}</strong>.</p><p>{start}</p><p>{paid}</p>",
            name = escape(self.student_name),
            course = escape(self.course_title),
            start = escape(&start),
            paid = escape(&paid),
        );
        if let Some(url) = self.meeting_url {
            html.push_str(&format!(
                "<p><a href=\"{url}\">Join the class</a></p>",
                url = escape(url)
            ));
        }
        html.push_str(&format!(
            "<p><a href=\"{url}\">Go to your courses</a></p>",
            url = escape(self.dashboard_url)
        ));

        RenderedEmail { subject, html, text }
    }
}

impl CouponEmail<'_> {
    fn discount_label(&self) -> String {
        match self.discount_type {
            DiscountType::Percentage => format!("{}% off", self.discount_value),
            DiscountType::Fixed => format!("{} off", format_money(self.discount_value, self.currency)),
        }
    }

    pub fn render(&self) -> RenderedEmail {
        let label = self.discount_label();
        let subject = format!("Your coupon {}: {label}", self.code);

        let scope = if self.course_titles.is_empty() {
            "any course".to_string()
        } else {
            self.course_titles.join(", ")
        };
        let expiry = self
            .valid_until
            .map(|d| format!("Valid until {}.", d.format("%B %-d, %Y")))
            .unwrap_or_default();

        let mut text = format!(
            "Hi {name},\n\nUse code {code} at checkout for {label} on {scope}. {expiry}\n",
            name = self.recipient_name,
            code = self.code,
        );
        let mut html = format!(
            "<p>Hi {name},</p><p>Use code <strong>{code}</strong> at checkout for {label} on {scope}. {expiry}</p>",
            name = escape(self.recipient_name),
            code = escape(self.code),
            label = escape(&label),
            scope = escape(&scope),
            expiry = escape(&expiry),
        );
        if let Some(message) = self.message {
            text.push_str(&format!("\n{message}\n"));
            html.push_str(&format!("<p>{}</p>", escape(message)));
        }

        RenderedEmail {
            subject,
            html,
            text: text.replace(" \n", "\n"),
        }
    }
}
