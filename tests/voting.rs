#![allow(non_snake_case)]
use arena_client::{
    ArenaClient,
    ArenaError,
    CancelToken,
    error::SubmissionError,
    test_helpers::*,
    wallet::SessionStatus,
};
use num_bigint::BigUint;

#[tokio::test(start_paused = true)]
async fn vote__reads_the_tally_once_the_vote_is_recorded() {
    // given
    let me = user_address(1, 1);
    let client = ArenaClient::new(FakeLedger::new(), FakeWallet::new(me), test_config());
    client
        .ledger()
        .script("hasVoted", vec![vec![vec![]], vec![vec![1]]]);
    client
        .ledger()
        .script("getVoteResults", vec![vec![vec![3], vec![], vec![0x01, 0x00]]]);

    // when
    let tally = client.vote(5, 2, CancelToken::never()).await.unwrap();

    // then
    assert_eq!(tally.proposal, 5);
    assert_eq!(
        tally.weights,
        vec![
            BigUint::from(3u32),
            BigUint::from(0u32),
            BigUint::from(256u32)
        ]
    );
    assert_eq!(tally.leading_option(), Some(2));
    assert_eq!(client.wallet().submitted()[0][0].data, "vote@05@02");
    assert_eq!(client.ledger().query_count("hasVoted"), 2);
}

#[tokio::test(start_paused = true)]
async fn vote__failed_session_is_reported_without_polling() {
    // given
    let me = user_address(1, 1);
    let client = ArenaClient::new(FakeLedger::new(), FakeWallet::new(me), test_config());
    client
        .wallet()
        .set_session_status(SessionStatus::Failed("already voted".to_string()));

    // when
    let result = client.vote(5, 2, CancelToken::never()).await;

    // then
    assert!(matches!(result, Err(ArenaError::ExecutionFailed(reason)) if reason == "already voted"));
    assert_eq!(client.ledger().query_count("hasVoted"), 0);
}

#[tokio::test(start_paused = true)]
async fn vote__closed_wallet_prompt_is_a_submission_error() {
    let client = ArenaClient::new(
        FakeLedger::new(),
        FakeWallet::new(user_address(1, 1)),
        test_config(),
    );
    client.wallet().withhold_next_handle();

    let result = client.vote(5, 2, CancelToken::never()).await;

    assert!(matches!(
        result,
        Err(ArenaError::Submission(SubmissionError::NoSession))
    ));
    assert!(client.ledger().queries().is_empty());
}
