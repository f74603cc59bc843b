//! Integration tests for the operation wire model.

use stele_crypto::{ActivationCode, PublicKeyHash, SecretKey};
use stele_types::{
    Ballot, BlockHeader, Contents, ContractAddress, ManagerContent, ManagerOperation,
    ProtocolData, Script, SeedNonce, ShellHeader, SignedOperation, Tez, H256,
};

fn signed(contents: Vec<Contents>) -> SignedOperation {
    let secret = SecretKey::from_seed(&[1u8; 32]);
    SignedOperation::sign(&secret, H256::keccak256(b"branch"), contents)
}

fn header() -> BlockHeader {
    let secret = SecretKey::from_seed(&[2u8; 32]);
    let mut header = BlockHeader {
        shell: ShellHeader {
            level: 42,
            proto: 1,
            predecessor: H256::keccak256(b"pred"),
            timestamp: 1_234,
            validation_passes: 4,
            operations_hash: H256::NIL,
            fitness: 43,
            context: H256::NIL,
        },
        protocol_data: ProtocolData {
            priority: 2,
            seed_nonce_hash: Some(SeedNonce([5u8; 32]).hash()),
            proof_of_work_nonce: [3u8; 8],
            signature: stele_crypto::Signature::ZERO,
        },
    };
    header.sign(&secret);
    header
}

fn assert_roundtrip(op: SignedOperation) {
    let decoded = SignedOperation::decode(&op.encode()).unwrap();
    assert_eq!(decoded, op);
    assert_eq!(decoded.hash(), op.hash());
}

#[test]
fn test_endorsement_roundtrip() {
    assert_roundtrip(signed(vec![Contents::Endorsement {
        block: H256::keccak256(b"endorsed"),
        level: 41,
        slots: vec![0, 3, 7],
    }]));
}

#[test]
fn test_seed_nonce_revelation_roundtrip() {
    assert_roundtrip(signed(vec![Contents::SeedNonceRevelation {
        level: 11,
        nonce: SeedNonce([9u8; 32]),
    }]));
}

#[test]
fn test_evidence_roundtrips() {
    let half = signed(vec![Contents::Endorsement {
        block: H256::keccak256(b"a"),
        level: 5,
        slots: vec![1],
    }]);
    let other = signed(vec![Contents::Endorsement {
        block: H256::keccak256(b"b"),
        level: 5,
        slots: vec![1],
    }]);
    assert_roundtrip(signed(vec![Contents::DoubleEndorsementEvidence {
        op1: Box::new(half),
        op2: Box::new(other),
    }]));

    assert_roundtrip(signed(vec![Contents::DoubleBakingEvidence {
        header1: Box::new(header()),
        header2: Box::new(header()),
    }]));
}

#[test]
fn test_activation_and_voting_roundtrips() {
    assert_roundtrip(signed(vec![Contents::ActivateAccount {
        pkh: PublicKeyHash::new([4u8; 20]),
        code: ActivationCode::new([5u8; 20]),
    }]));
    assert_roundtrip(signed(vec![Contents::Proposals {
        source: PublicKeyHash::new([6u8; 20]),
        period: 3,
        proposals: vec![H256::keccak256(b"proto-a"), H256::keccak256(b"proto-b")],
    }]));
    assert_roundtrip(signed(vec![Contents::Ballot {
        source: PublicKeyHash::new([6u8; 20]),
        period: 3,
        proposal: H256::keccak256(b"proto-a"),
        ballot: Ballot::Pass,
    }]));
}

#[test]
fn test_manager_batch_roundtrip() {
    let secret = SecretKey::from_seed(&[3u8; 32]);
    let source = ContractAddress::implicit(secret.public_key_hash());
    assert_roundtrip(signed(vec![
        Contents::Manager(ManagerOperation {
            source,
            fee: Tez::from_mutez(1_000),
            counter: 1,
            gas_limit: 10_000,
            storage_limit: 500,
            content: ManagerContent::Reveal {
                public_key: secret.public_key().clone(),
            },
        }),
        Contents::Manager(ManagerOperation {
            source,
            fee: Tez::from_mutez(2_000),
            counter: 2,
            gas_limit: 20_000,
            storage_limit: 600,
            content: ManagerContent::Origination {
                manager: secret.public_key_hash(),
                delegate: Some(PublicKeyHash::new([7u8; 20])),
                script: Some(Script::new(b"code".to_vec(), b"storage".to_vec())),
                spendable: true,
                delegatable: false,
                credit: Tez::from_mutez(9),
            },
        }),
        Contents::Manager(ManagerOperation {
            source,
            fee: Tez::ZERO,
            counter: 3,
            gas_limit: 0,
            storage_limit: 0,
            content: ManagerContent::Delegation { delegate: None },
        }),
    ]));
}

#[test]
fn test_signature_covers_contents() {
    let secret = SecretKey::from_seed(&[1u8; 32]);
    let mut op = signed(vec![Contents::SeedNonceRevelation {
        level: 11,
        nonce: SeedNonce([9u8; 32]),
    }]);
    assert!(op.verify_signature(secret.public_key()));

    op.contents = vec![Contents::SeedNonceRevelation {
        level: 12,
        nonce: SeedNonce([9u8; 32]),
    }];
    assert!(!op.verify_signature(secret.public_key()));
}

#[test]
fn test_header_roundtrip() {
    let header = header();
    let decoded = BlockHeader::decode(&header.encode()).unwrap();
    assert_eq!(decoded, header);
    assert_eq!(decoded.hash(), header.hash());
    assert_eq!(decoded.pow_stamp(), header.pow_stamp());
}
