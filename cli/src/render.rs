//! Plain-text rendering of marketplace data for the terminal.

use std::fmt::Write;

use market_client::{LifecycleEvent, OwnerStats, PageView};
use market_gateway::Receipt;
use market_types::{
    Address, Product, RatingDistribution, ReviewedFeedback, RewardPoolStatus, Timestamp, TxHash,
    Wei,
};
use market_utils::{format_average, format_days_ago, format_time_ago, truncate_middle};

const ETHER_DECIMALS: usize = 4;

pub fn short_address(address: &Address) -> String {
    address.short()
}

pub fn short_tx(tx: &TxHash) -> String {
    truncate_middle(&tx.to_string(), 10, 8)
}

pub fn ether(amount: Wei) -> String {
    format!("{} ETH", amount.to_ether_string(ETHER_DECIMALS))
}

fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn product_line(product: &Product, now: Timestamp) -> String {
    let mut line = format!(
        "#{:<5} {}  {} ({} reviews)  by {}  {}",
        product.id.0,
        product.name,
        format_average(product.average_rating()),
        product.rating_count,
        short_address(&product.owner),
        format_days_ago(product.created_at, now),
    );
    if !product.is_active {
        line.push_str("  [inactive]");
    }
    line
}

pub fn feedback_line(entry: &ReviewedFeedback, now: Timestamp) -> String {
    let feedback = &entry.feedback;
    let mut line = format!(
        "#{:<5} {} [{}] product #{} by {}  {}",
        feedback.id.0,
        stars(feedback.rating),
        entry.status,
        feedback.product_id.0,
        short_address(&feedback.reviewer),
        format_time_ago(feedback.created_at, now),
    );
    if feedback.is_verified {
        line.push_str("  verified");
    }
    let _ = write!(line, "\n       {}", feedback.comment);
    line
}

pub fn page<T>(view: &PageView<T>, line: impl Fn(&T) -> String) -> String {
    if view.total_matches == 0 {
        return "no matches".to_string();
    }
    let mut out = String::new();
    for item in &view.items {
        out.push_str(&line(item));
        out.push('\n');
    }
    let last = view.first_position() + view.items.len().saturating_sub(1);
    let _ = write!(
        out,
        "showing {}-{} of {}  (page {} of {})",
        view.first_position(),
        last,
        view.total_matches,
        view.page,
        view.total_pages,
    );
    out
}

pub fn product_detail(product: &Product, feedback: &[ReviewedFeedback], now: Timestamp) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", product.name, product.id.0);
    let _ = writeln!(out, "{}", product.description);
    let _ = writeln!(out, "url:     {}", product.product_url);
    if !product.image_url.is_empty() {
        let _ = writeln!(out, "image:   {}", product.image_url);
    }
    let _ = writeln!(out, "owner:   {}", product.owner);
    let _ = writeln!(out, "listed:  {}", format_days_ago(product.created_at, now));
    let _ = writeln!(
        out,
        "rating:  {} from {} reviews{}",
        format_average(product.average_rating()),
        product.rating_count,
        if product.is_active { "" } else { "  [inactive]" },
    );

    let distribution = RatingDistribution::from_ratings(feedback.iter().map(|r| r.feedback.rating));
    for star in (1..=5).rev() {
        let _ = writeln!(
            out,
            "  {star}★ {:>4} {:>5.1}%",
            distribution.count(star),
            distribution.percentage(star),
        );
    }
    if feedback.is_empty() {
        out.push_str("no feedback yet");
    } else {
        for entry in feedback {
            let _ = writeln!(out, "{}", feedback_line(entry, now));
        }
    }
    out.trim_end().to_string()
}

pub fn pool(status: &RewardPoolStatus) -> String {
    format!(
        "pool:       {}\nper review: {}\nremaining:  {} rewards{}",
        ether(status.current_pool),
        ether(status.reward_per_feedback),
        status.remaining_rewards,
        if status.can_pay_reward() {
            ""
        } else {
            "  (pool exhausted)"
        },
    )
}

pub fn owner_stats(owner: &Address, stats: &OwnerStats, now: Timestamp) -> String {
    let joined = stats
        .joined_at
        .map(|at| format_days_ago(at, now))
        .unwrap_or_else(|| "no listings yet".to_string());
    format!(
        "{}\nproducts:       {}\nfeedback:       {}\naverage rating: {}\njoined:         {}",
        owner,
        stats.product_count,
        stats.total_feedback,
        format_average(stats.average_rating),
        joined,
    )
}

pub fn receipt(receipt: &Receipt) -> String {
    format!(
        "confirmed in block {} (tx {})",
        receipt.block_number,
        short_tx(&receipt.tx_hash)
    )
}

/// One progress line per lifecycle transition.
pub fn event(event: &LifecycleEvent) -> String {
    match event {
        LifecycleEvent::Started { kind, .. } => format!("{kind}: submitting"),
        LifecycleEvent::Submitted { kind, tx, .. } => {
            format!("{kind}: waiting for confirmation of {}", short_tx(tx))
        }
        LifecycleEvent::Settled {
            kind, refreshed, ..
        } => {
            if *refreshed {
                format!("{kind}: confirmed")
            } else {
                format!("{kind}: confirmed, but reloading data failed")
            }
        }
        LifecycleEvent::Failed {
            kind,
            reason,
            message,
            ..
        } => format!("{kind}: failed ({reason}): {message}"),
        LifecycleEvent::Abandoned { kind, .. } => format!("{kind}: abandoned"),
        LifecycleEvent::Reset { key } => format!("{key}: cleared"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_client::ListViewController;
    use market_types::{Feedback, FeedbackId, FeedbackStatus, ProductId};

    const DAY: u64 = 86_400;

    fn product(id: u64, total: u64, count: u64) -> Product {
        Product {
            id: ProductId(id),
            owner: Address::new([0xab; 20]),
            name: format!("Product {id}"),
            description: "A thing".into(),
            image_url: String::new(),
            product_url: "https://thing.example".into(),
            created_at: Timestamp::new(10 * DAY),
            total_rating: total,
            rating_count: count,
            is_active: true,
        }
    }

    fn review(id: u64, rating: u8, status: FeedbackStatus) -> ReviewedFeedback {
        ReviewedFeedback {
            feedback: Feedback {
                id: FeedbackId(id),
                product_id: ProductId(1),
                reviewer: Address::new([0x11; 20]),
                comment: "Works as described".into(),
                rating,
                created_at: Timestamp::new(10 * DAY),
                is_verified: false,
            },
            status,
        }
    }

    #[test]
    fn addresses_keep_prefix_and_tail() {
        assert_eq!(short_address(&Address::new([0xab; 20])), "0xabab...abab");
    }

    #[test]
    fn product_line_shows_average_and_age() {
        let line = product_line(&product(7, 9, 2), Timestamp::new(12 * DAY));
        assert!(line.starts_with("#7"));
        assert!(line.contains("4.5 (2 reviews)"));
        assert!(line.contains("2 days ago"));
        assert!(!line.contains("inactive"));
    }

    #[test]
    fn inactive_products_are_marked() {
        let mut p = product(1, 0, 0);
        p.is_active = false;
        assert!(product_line(&p, Timestamp::new(10 * DAY)).ends_with("[inactive]"));
    }

    #[test]
    fn feedback_line_shows_stars_and_status() {
        let line = feedback_line(
            &review(3, 4, FeedbackStatus::Pending),
            Timestamp::new(10 * DAY + 7_200),
        );
        assert!(line.contains("★★★★☆ [pending]"));
        assert!(line.contains("2h ago"));
        assert!(line.ends_with("Works as described"));
    }

    #[test]
    fn empty_page_says_so() {
        let list: ListViewController<Product> = ListViewController::new(12);
        assert_eq!(page(&list.view(), |p| p.name.clone()), "no matches");
    }

    #[test]
    fn page_footer_counts_positions() {
        let items: Vec<Product> = (1..=5).map(|i| product(i, 0, 0)).collect();
        let mut list = ListViewController::new(2).with_items(items);
        list.set_page(2);
        let out = page(&list.view(), |p| p.name.clone());
        assert!(out.ends_with("showing 3-4 of 5  (page 2 of 3)"));
    }

    #[test]
    fn detail_includes_distribution() {
        let feedback = vec![
            review(1, 5, FeedbackStatus::Approved),
            review(2, 5, FeedbackStatus::Pending),
            review(3, 1, FeedbackStatus::Rejected),
        ];
        let out = product_detail(&product(1, 11, 3), &feedback, Timestamp::new(10 * DAY));
        assert!(out.contains("5★    2  66.7%"));
        assert!(out.contains("1★    1  33.3%"));
        assert!(out.contains("[rejected]"));
    }

    #[test]
    fn exhausted_pool_is_flagged() {
        let status = RewardPoolStatus {
            current_pool: Wei::ZERO,
            reward_per_feedback: Wei::new(100),
            remaining_rewards: 0,
        };
        assert!(pool(&status).ends_with("(pool exhausted)"));
    }

    #[test]
    fn stats_without_listings() {
        let out = owner_stats(
            &Address::new([1; 20]),
            &OwnerStats::default(),
            Timestamp::new(DAY),
        );
        assert!(out.contains("products:       0"));
        assert!(out.ends_with("no listings yet"));
    }
}
