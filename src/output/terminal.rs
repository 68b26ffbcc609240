// Colored terminal output for ranks, threads, and the leaderboard.
//
// The CLI's display functions delegate here. Rank badges use the rank's
// color hint; everything else sticks to bold/dimmed.

use colored::{Color, ColoredString, Colorize};

use crate::comments::CommentNode;
use crate::db::models::ReputationAccount;
use crate::engagement::{ReconcileReport, ToggleOutcome};
use crate::reputation::leaderboard::LeaderboardEntry;
use crate::reputation::{Capability, PointCatalog, Rank, RankTable};

use super::truncate_chars;

/// The rank label painted in its color hint.
pub fn badge(rank: &Rank) -> ColoredString {
    let color = Color::from(rank.color_hint.as_str());
    let label = format!("[{}]", rank.label).color(color);
    if rank.is_admin() || rank.can_perform(Capability::DistinguishedName) {
        label.bold()
    } else {
        label
    }
}

/// One account's score, rank, and progress to the next rank.
pub fn display_account(account: &ReputationAccount, ranks: &RankTable) {
    let rank = ranks.resolve(account.score, account.is_admin);
    let name = account.username.as_deref().unwrap_or(&account.user_id);

    println!("\n{}", format!("=== Prestige for {} ===", name).bold());
    println!("  Score: {}", account.score);
    println!("  Rank:  {}", badge(rank));

    if !rank.is_admin() {
        match ranks.next_rank(account.score) {
            Some((next, needed)) => {
                println!("  Next:  {} in {} points", badge(next), needed)
            }
            None => println!("  {}", "Top of the ladder".dimmed()),
        }
    }

    let granted: Vec<&str> = Capability::ALL
        .iter()
        .filter(|c| rank.can_perform(**c))
        .map(|c| c.as_str())
        .collect();
    println!("  Can:   {}", granted.join(", "));
    if !rank.restrictions.is_empty() {
        let denied: Vec<&str> = rank.restrictions.iter().map(|c| c.as_str()).collect();
        println!("  {}", format!("Cannot: {}", denied.join(", ")).dimmed());
    }
}

/// The full rank ladder plus the point catalog.
pub fn display_rank_table(ranks: &RankTable, catalog: &PointCatalog) {
    println!("\n{}", "=== Ranks ===".bold());
    for rank in ranks.ranks() {
        println!(
            "  {:>6}  {}",
            rank.min_score().unwrap_or_default(),
            badge(rank)
        );
    }
    println!("  {:>6}  {}", "admin".dimmed(), badge(ranks.admin()));

    println!("\n{}", "=== Points ===".bold());
    for (action, points) in catalog.entries() {
        let value = format!("{points:+}");
        let value = if points < 0 { value.red() } else { value.green() };
        println!("  {:<16} {:>5}", action.as_str(), value);
    }
}

/// A post's comment forest, replies indented under their parents.
pub fn display_thread(post_id: i64, forest: &[CommentNode]) {
    if forest.is_empty() {
        println!("No comments on post {post_id} yet.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Thread for post {} ({} comments) ===", post_id, crate::comments::node_count(forest)).bold()
    );

    // Explicit stack so very deep reply chains don't recurse
    let mut stack: Vec<(&CommentNode, usize)> = forest.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        let c = &node.comment;
        println!(
            "{}{} {} {}",
            "  ".repeat(depth + 1),
            format!("#{}", c.id).dimmed(),
            c.author_id.bold(),
            truncate_chars(&c.content, 80),
        );
        if c.like_count > 0 {
            println!("{}  {} likes", "  ".repeat(depth + 1), c.like_count);
        }
        stack.extend(node.replies.iter().rev().map(|r| (r, depth + 1)));
    }
}

pub fn display_toggle(outcome: &ToggleOutcome) {
    let state = if outcome.liked {
        "liked".green()
    } else {
        "unliked".yellow()
    };
    println!("{} ({} likes)", state, outcome.like_count);
    if let Some(warning) = &outcome.counter_warning {
        println!("  {} {}", "!".yellow(), warning.to_string().dimmed());
    }
}

pub fn display_leaderboard(entries: &[LeaderboardEntry]) {
    if entries.is_empty() {
        println!("Nobody has reached the leaderboard yet.");
        return;
    }

    println!("\n{}", "=== Leaderboard ===".bold());
    for (i, entry) in entries.iter().enumerate() {
        let name = entry
            .account
            .username
            .as_deref()
            .unwrap_or(&entry.account.user_id);
        let color = Color::from(entry.color_hint.as_str());
        println!(
            "  {:>3}. {:<32} {:>6}  {}",
            i + 1,
            name,
            entry.account.score,
            entry.rank_label.color(color),
        );
    }
}

pub fn display_reconcile(report: &ReconcileReport) {
    println!(
        "Checked {} subjects: {} corrected, {} failed",
        report.checked, report.corrected, report.failed
    );
    if report.failed > 0 {
        println!(
            "  {} some counters could not be checked; see the log and rerun",
            "!".yellow()
        );
    }
}
