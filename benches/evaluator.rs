use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use cardroom::entities::{Card, Deck, RANK_ACE, Suit};
use cardroom::evaluate;

fn deal_hands(count: usize) -> Vec<[Card; 7]> {
    let mut deck = Deck::default();
    let mut hands = Vec::with_capacity(count);
    for _ in 0..count {
        deck.shuffle();
        hands.push([
            deck.deal(),
            deck.deal(),
            deck.deal(),
            deck.deal(),
            deck.deal(),
            deck.deal(),
            deck.deal(),
        ]);
    }
    hands
}

fn bench_evaluate(c: &mut Criterion) {
    let hands = deal_hands(1_000);
    c.bench_function("evaluate_random_seven", |b| {
        let mut i = 0;
        b.iter(|| {
            let hand = &hands[i % hands.len()];
            i += 1;
            black_box(evaluate(hand))
        });
    });

    // Worst case for the flush path: six suited cards.
    let suited = [
        Card(RANK_ACE, Suit::Heart),
        Card(12, Suit::Heart),
        Card(10, Suit::Heart),
        Card(8, Suit::Heart),
        Card(6, Suit::Heart),
        Card(4, Suit::Heart),
        Card(2, Suit::Spade),
    ];
    c.bench_function("evaluate_flush_heavy", |b| {
        b.iter(|| black_box(evaluate(black_box(&suited))));
    });
}

fn bench_showdown_comparison(c: &mut Criterion) {
    let hands = deal_hands(512);
    c.bench_function("compare_pairwise", |b| {
        let mut i = 0;
        b.iter(|| {
            let a = evaluate(&hands[i % hands.len()]);
            let z = evaluate(&hands[(i + 1) % hands.len()]);
            i += 1;
            black_box(a.cmp(&z))
        });
    });
}

criterion_group!(benches, bench_evaluate, bench_showdown_comparison);
criterion_main!(benches);
