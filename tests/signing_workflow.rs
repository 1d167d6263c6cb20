//! End-to-end tests for signing and fetching against a real SQLite file

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use signing_ledger::db::{
    AnswerLedger, QuestionCatalog, Scope, SignatureLedger, SqliteAnswerLedger,
    SqliteQuestionCatalog, SqliteSignatureLedger, SqliteTransactionManager, SqliteUserStore,
    TransactionManager,
};
use signing_ledger::db::diesel_schema::questions;
use signing_ledger::entities::{Answer, PendingAnswer, Question, Signature, User};
use signing_ledger::services::{FetchInput, SignInput};
use signing_ledger::{LedgerError, Services, SigningDb};
use tempfile::TempDir;
use uuid::Uuid;

fn open_db() -> (Arc<SigningDb>, TempDir) {
    open_db_with_pool(4)
}

fn open_db_with_pool(pool_size: u32) -> (Arc<SigningDb>, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = SigningDb::open(&dir.path().join("ledger.db"), pool_size, 5000).unwrap();
    (Arc::new(db), dir)
}

fn user(name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        username: name.to_string(),
    }
}

fn sign_input(user: &User, items: &[(Uuid, &str, &str)]) -> SignInput {
    let mut questions = BTreeMap::new();
    let mut answers = BTreeMap::new();
    for (id, question, answer) in items {
        questions.insert(
            *id,
            Question {
                id: *id,
                text: question.to_string(),
            },
        );
        answers.insert(*id, answer.to_string());
    }
    SignInput {
        user: user.clone(),
        questions,
        answers,
    }
}

fn sign(services: &Services, input: SignInput) -> Uuid {
    let output = services.sign.sign(input).unwrap();
    Uuid::parse_str(&output.signature).unwrap()
}

fn fetch(services: &Services, user: &User, signature: Uuid) -> Result<Vec<Answer>, LedgerError> {
    services
        .fetch
        .fetch(FetchInput {
            user: user.clone(),
            signature,
        })
        .map(|output| output.answers)
}

/// Answer ledger that fails on the Nth row it is asked to write
struct FailingAnswerLedger {
    inner: SqliteAnswerLedger,
    fail_at: usize,
    attempted_signature: Mutex<Option<Uuid>>,
}

impl AnswerLedger for FailingAnswerLedger {
    fn persist(
        &self,
        scope: &mut Scope,
        signature_id: &Uuid,
        answers: &[PendingAnswer],
    ) -> Result<(), LedgerError> {
        *self.attempted_signature.lock().unwrap() = Some(*signature_id);

        for (i, answer) in answers.iter().enumerate() {
            if i + 1 == self.fail_at {
                return Err(LedgerError::Store("injected answer failure".into()));
            }
            self.inner
                .persist(scope, signature_id, std::slice::from_ref(answer))?;
        }
        Ok(())
    }

    fn get(&self, signature_id: &Uuid) -> Result<Vec<Answer>, LedgerError> {
        self.inner.get(signature_id)
    }
}

/// Transaction manager whose begin always fails
struct RefusingTransactionManager;

impl TransactionManager for RefusingTransactionManager {
    fn begin(&self) -> Result<Scope, LedgerError> {
        Err(LedgerError::Store("Failed to begin transaction: database is locked".into()))
    }

    fn commit(&self, _scope: &mut Scope) -> Result<(), LedgerError> {
        Ok(())
    }

    fn rollback(&self, _scope: &mut Scope) {}
}

/// Signature ledger that refuses every write but still serves reads
struct FailingSignatureLedger {
    inner: SqliteSignatureLedger,
    questions_seen: Mutex<Option<u64>>,
    db: Arc<SigningDb>,
}

impl SignatureLedger for FailingSignatureLedger {
    fn persist(&self, scope: &mut Scope, _signature: &Signature) -> Result<(), LedgerError> {
        // Questions are written through the scope before the signature row
        let questions: i64 = self.db.with_scope(scope, |conn| {
            use diesel::prelude::*;
            questions::table
                .count()
                .get_result(conn)
                .map_err(LedgerError::from)
        })?;
        *self.questions_seen.lock().unwrap() = Some(questions as u64);
        Err(LedgerError::Store("injected signature failure".into()))
    }

    fn get(&self, id: &Uuid) -> Result<Option<Signature>, LedgerError> {
        self.inner.get(id)
    }
}

fn services_with(
    db: &Arc<SigningDb>,
    signatures: Arc<dyn SignatureLedger>,
    tm: Arc<dyn TransactionManager>,
) -> Services {
    Services::from_parts(
        Arc::new(SqliteUserStore::new(db.clone())),
        Arc::new(SqliteQuestionCatalog::new(db.clone())),
        Arc::new(SqliteAnswerLedger::new(db.clone())),
        signatures,
        tm,
    )
}

#[test]
fn test_end_to_end_sign_and_fetch() {
    let (db, _dir) = open_db();
    let services = Services::new(db);

    let (u1, u2) = (user("ann"), user("bob"));
    let (q1, q2) = (Uuid::new_v4(), Uuid::new_v4());

    let s1 = sign(
        &services,
        sign_input(&u1, &[(q1, "Name?", "Ann"), (q2, "Age?", "30")]),
    );

    let output = services
        .fetch
        .fetch(FetchInput {
            user: u1.clone(),
            signature: s1,
        })
        .unwrap();

    let mut got: Vec<(Uuid, String, String)> = output
        .answers
        .into_iter()
        .map(|a| (a.question.id, a.question.text, a.answer))
        .collect();
    got.sort();

    let mut want = vec![
        (q1, "Name?".to_string(), "Ann".to_string()),
        (q2, "Age?".to_string(), "30".to_string()),
    ];
    want.sort();

    assert_eq!(got, want);
    assert!((chrono::Utc::now().timestamp() - output.timestamp).abs() < 60);

    assert!(matches!(
        fetch(&services, &u2, s1),
        Err(LedgerError::AccessForbidden { .. })
    ));
    assert!(matches!(
        fetch(&services, &u1, Uuid::new_v4()),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn test_not_found_precedes_ownership_check() {
    let (db, _dir) = open_db();
    let services = Services::new(db);

    let owner = user("ann");
    let q1 = Uuid::new_v4();
    sign(&services, sign_input(&owner, &[(q1, "Name?", "Ann")]));

    let stranger = user("eve");
    assert!(matches!(
        fetch(&services, &stranger, Uuid::new_v4()),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn test_signature_ids_are_unique() {
    let (db, _dir) = open_db();
    let services = Services::new(db);

    let u1 = user("ann");
    let q1 = Uuid::new_v4();

    let mut seen = HashSet::new();
    for i in 0..20 {
        let answer = i.to_string();
        let id = sign(&services, sign_input(&u1, &[(q1, "Count?", answer.as_str())]));
        assert!(seen.insert(id), "signature id {} returned twice", id);
    }
}

#[test]
fn test_question_text_first_write_wins() {
    let (db, _dir) = open_db();
    let services = Services::new(db.clone());
    let catalog = SqliteQuestionCatalog::new(db);

    let u1 = user("al");
    let q1 = Uuid::new_v4();

    sign(&services, sign_input(&u1, &[(q1, "name?", "Al")]));
    let s2 = sign(&services, sign_input(&u1, &[(q1, "age?", "30")]));

    assert_eq!(catalog.get(&q1).unwrap().unwrap().text, "name?");

    let answers = fetch(&services, &u1, s2).unwrap();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].question.text, "name?");
    assert_eq!(answers[0].answer, "30");
}

#[test]
fn test_bijection_violation_persists_nothing() {
    let (db, _dir) = open_db();
    let services = Services::new(db.clone());

    let u1 = user("ann");
    let (q1, q2) = (Uuid::new_v4(), Uuid::new_v4());

    // Answer without a question
    let mut input = sign_input(&u1, &[(q1, "Name?", "Ann")]);
    input.answers.insert(q2, "stray".into());
    assert!(matches!(
        services.sign.sign(input),
        Err(LedgerError::Validation(_))
    ));

    // Question without an answer
    let mut input = sign_input(&u1, &[(q1, "Name?", "Ann")]);
    input.questions.insert(
        q2,
        Question {
            id: q2,
            text: "Age?".into(),
        },
    );
    assert!(matches!(
        services.sign.sign(input),
        Err(LedgerError::Validation(_))
    ));

    let stats = db.stats().unwrap();
    assert_eq!(stats.questions, 0);
    assert_eq!(stats.signatures, 0);
    assert_eq!(stats.answers, 0);
}

#[test]
fn test_answer_failure_rolls_back_everything() {
    let (db, _dir) = open_db();

    let failing = Arc::new(FailingAnswerLedger {
        inner: SqliteAnswerLedger::new(db.clone()),
        fail_at: 2,
        attempted_signature: Mutex::new(None),
    });

    let faulty = Services::from_parts(
        Arc::new(SqliteUserStore::new(db.clone())),
        Arc::new(SqliteQuestionCatalog::new(db.clone())),
        failing.clone(),
        Arc::new(SqliteSignatureLedger::new(db.clone())),
        Arc::new(SqliteTransactionManager::new(db.clone())),
    );
    let healthy = Services::new(db.clone());

    let u1 = user("ann");
    let items = [
        (Uuid::new_v4(), "Name?", "Ann"),
        (Uuid::new_v4(), "Age?", "30"),
        (Uuid::new_v4(), "City?", "Oslo"),
    ];

    let err = faulty.sign.sign(sign_input(&u1, &items)).unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));

    let attempted = failing.attempted_signature.lock().unwrap().unwrap();

    // Identity registration happens outside the scope and survives
    let stats = db.stats().unwrap();
    assert_eq!(stats.users, 1);
    assert_eq!(stats.questions, 0);
    assert_eq!(stats.signatures, 0);
    assert_eq!(stats.answers, 0);

    // A retried signing attempt succeeds; the failed one stays invisible
    let retried = sign(&healthy, sign_input(&u1, &items));
    assert_ne!(retried, attempted);
    assert_eq!(fetch(&healthy, &u1, retried).unwrap().len(), 3);

    assert!(matches!(
        fetch(&healthy, &u1, attempted),
        Err(LedgerError::NotFound(_))
    ));
    assert!(healthy_answers(&db, attempted).is_empty());
}

#[test]
fn test_begin_failure_writes_nothing_in_scope() {
    let (db, _dir) = open_db();
    let faulty = services_with(
        &db,
        Arc::new(SqliteSignatureLedger::new(db.clone())),
        Arc::new(RefusingTransactionManager),
    );

    let u1 = user("ann");
    let err = faulty
        .sign
        .sign(sign_input(&u1, &[(Uuid::new_v4(), "Name?", "Ann")]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::Store(_)));

    let stats = db.stats().unwrap();
    assert_eq!(stats.users, 1);
    assert_eq!(stats.questions, 0);
    assert_eq!(stats.signatures, 0);
    assert_eq!(stats.answers, 0);
}

#[test]
fn test_signature_failure_discards_written_questions() {
    // Two pooled connections: a scope that leaked its connection would
    // starve the signings that follow.
    let (db, _dir) = open_db_with_pool(2);
    let failing = Arc::new(FailingSignatureLedger {
        inner: SqliteSignatureLedger::new(db.clone()),
        questions_seen: Mutex::new(None),
        db: db.clone(),
    });
    let faulty = services_with(
        &db,
        failing.clone(),
        Arc::new(SqliteTransactionManager::new(db.clone())),
    );
    let healthy = Services::new(db.clone());

    let u1 = user("ann");
    let items = [
        (Uuid::new_v4(), "Name?", "Ann"),
        (Uuid::new_v4(), "Age?", "30"),
    ];

    for _ in 0..3 {
        let err = faulty.sign.sign(sign_input(&u1, &items)).unwrap_err();
        assert!(matches!(err, LedgerError::Store(_)));
    }
    assert_eq!(*failing.questions_seen.lock().unwrap(), Some(2));

    let stats = db.stats().unwrap();
    assert_eq!(stats.questions, 0);
    assert_eq!(stats.signatures, 0);
    assert_eq!(stats.answers, 0);

    for _ in 0..3 {
        let id = sign(&healthy, sign_input(&u1, &items));
        assert_eq!(fetch(&healthy, &u1, id).unwrap().len(), 2);
    }
    assert_eq!(db.stats().unwrap().questions, 2);
}

fn healthy_answers(db: &Arc<SigningDb>, signature: Uuid) -> Vec<Answer> {
    SqliteAnswerLedger::new(db.clone()).get(&signature).unwrap()
}

#[test]
fn test_concurrent_signers_share_question() {
    let (db, _dir) = open_db();
    let services = Arc::new(Services::new(db.clone()));
    let q1 = Uuid::new_v4();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let services = services.clone();
            std::thread::spawn(move || {
                let signer = user(&format!("user-{}", i));
                let id = sign(&services, sign_input(&signer, &[(q1, "Shared?", "yes")]));
                (signer, id)
            })
        })
        .collect();

    for handle in handles {
        let (signer, id) = handle.join().unwrap();
        assert_eq!(fetch(&services, &signer, id).unwrap().len(), 1);
    }

    let stats = db.stats().unwrap();
    assert_eq!(stats.questions, 1);
    assert_eq!(stats.signatures, 4);
}

#[test]
fn test_detached_scope_writes_are_not_rolled_back() {
    let (db, _dir) = open_db();
    let catalog = SqliteQuestionCatalog::new(db.clone());

    let mut scope = Scope::detached();
    assert!(!scope.is_active());
    catalog
        .persist(
            &mut scope,
            &[Question {
                id: Uuid::new_v4(),
                text: "Standalone?".into(),
            }],
        )
        .unwrap();
    drop(scope);

    assert_eq!(db.stats().unwrap().questions, 1);
}
