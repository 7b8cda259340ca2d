//! # Transaction Tier Tests (T0-T6)
//!
//! If ANY tier fails, the engine is INVALID.
//!
//! ## Tiers
//! - T0: IID Uniqueness
//! - T1: Commit Visibility
//! - T2: Adjacency Symmetry
//! - T3: No-Duplicate Traversal
//! - T4: Schema Exclusivity
//! - T5: Counter Monotonicity Under Abort
//! - T6: End-to-End Schema Change

use std::path::Path;
use tempfile::{TempDir, tempdir};
use trellis_core::{
    GraphError, Iid, Keyspace, SessionType, Status, ThingEdgeSchema, TransactionType,
    TypeEdgeSchema, TypeSchema, Value, ValueType,
};

// =============================================================================
// HELPERS
// =============================================================================

fn keyspace() -> (TempDir, Keyspace) {
    let dir = tempdir().expect("tempdir");
    let keyspace = Keyspace::create(dir.path().join("tiers.trellis")).expect("create");
    (dir, keyspace)
}

/// Define an entity type in its own schema session.
fn define(keyspace: &Keyspace, schema: TypeSchema, label: &str) -> Iid {
    let session = keyspace.session(SessionType::Schema);
    let mut transaction = session.transaction(TransactionType::Write).expect("tx");
    let iid = transaction.types().create(schema, label).expect("create type");
    transaction.commit().expect("commit");
    iid
}

/// Create `count` instances of `type_iid` in one data transaction.
fn instances(keyspace: &Keyspace, type_iid: &Iid, count: usize) -> Vec<Iid> {
    let session = keyspace.session(SessionType::Data);
    let mut transaction = session.transaction(TransactionType::Write).expect("tx");
    let iids = (0..count)
        .map(|_| transaction.graphs().create_thing(type_iid).expect("thing"))
        .collect();
    transaction.commit().expect("commit");
    iids
}

fn reopen(path: &Path) -> Keyspace {
    Keyspace::open(path).expect("open")
}

// =============================================================================
// TIER T0: IID UNIQUENESS
// =============================================================================

mod t0_iid_uniqueness {
    use super::*;

    /// T0.1: Every new thing gets a distinct, increasing IID.
    #[test]
    fn thing_iids_are_distinct() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");

        let iids = instances(&keyspace, &person, 20);
        let mut sorted = iids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, iids);
    }

    /// T0.2: Deleting the highest thing does not free its IID across a restart.
    #[test]
    fn deleted_thing_iid_not_reissued_after_restart() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("restart.trellis");
        let (person, highest) = {
            let keyspace = Keyspace::create(&path).expect("create");
            let person = define(&keyspace, TypeSchema::EntityType, "person");
            let iids = instances(&keyspace, &person, 3);
            let highest = iids.last().cloned().expect("three iids");

            let session = keyspace.session(SessionType::Data);
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            assert!(transaction.things().delete(&highest).expect("delete"));
            transaction.commit().expect("commit");
            (person, highest)
        };

        let keyspace = reopen(&path);
        let next = instances(&keyspace, &person, 1).remove(0);
        assert!(next > highest);
    }

    /// T0.3: Deleting the highest type does not free its IID across a restart.
    #[test]
    fn deleted_type_iid_not_reissued_after_restart() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("types.trellis");
        let company = {
            let keyspace = Keyspace::create(&path).expect("create");
            define(&keyspace, TypeSchema::EntityType, "person");
            let company = define(&keyspace, TypeSchema::EntityType, "company");

            let session = keyspace.session(SessionType::Schema);
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            assert!(transaction.types().delete(&company).expect("delete"));
            transaction.commit().expect("commit");
            company
        };

        let keyspace = reopen(&path);
        let animal = define(&keyspace, TypeSchema::EntityType, "animal");
        assert!(animal > company);
    }
}

// =============================================================================
// TIER T1: COMMIT VISIBILITY
// =============================================================================

mod t1_commit_visibility {
    use super::*;

    /// T1.1: Buffered things are visible only inside their transaction until commit.
    #[test]
    fn buffered_invisible_until_commit() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);

        let mut writer = session.transaction(TransactionType::Write).expect("writer");
        let alice = writer.graphs().create_thing(&person).expect("thing");
        assert!(writer.things().get(&alice).expect("get").is_some());

        let mut before = session.transaction(TransactionType::Read).expect("reader");
        assert!(before.things().get(&alice).expect("get").is_none());

        writer.commit().expect("commit");
        assert!(before.things().get(&alice).expect("get").is_none());

        let mut after = session.transaction(TransactionType::Read).expect("reader");
        let vertex = after.things().get(&alice).expect("get").expect("visible");
        assert_eq!(vertex.status(), Status::Persisted);
        assert_eq!(vertex.type_iid(), person);
    }

    /// T1.2: A dropped transaction leaves nothing behind.
    #[test]
    fn dropped_transaction_discards_writes() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);

        let alice = {
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            transaction.graphs().create_thing(&person).expect("thing")
        };

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        assert!(reader.things().get(&alice).expect("get").is_none());
    }

    /// T1.3: Read transactions reject writes and cannot commit.
    #[test]
    fn read_transaction_is_read_only() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        assert!(matches!(
            reader.graphs().create_thing(&person),
            Err(GraphError::ReadOnly)
        ));
        assert!(matches!(reader.commit(), Err(GraphError::ReadOnly)));
    }

    /// T1.4: Attribute values survive commit.
    #[test]
    fn attribute_value_persisted() {
        let (_dir, keyspace) = keyspace();
        let age = {
            let session = keyspace.session(SessionType::Schema);
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            let age = transaction
                .types()
                .create(TypeSchema::AttributeType, "age")
                .expect("create");
            transaction
                .types()
                .get_mut(&age)
                .expect("get")
                .expect("exists")
                .set_value_type(ValueType::Long)
                .expect("value type");
            transaction.commit().expect("commit");
            age
        };

        let session = keyspace.session(SessionType::Data);
        let mut writer = session.transaction(TransactionType::Write).expect("tx");
        let forty = writer
            .graphs()
            .create_attribute(&age, Value::Long(-40))
            .expect("attribute");
        writer.commit().expect("commit");

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        let vertex = reader.things().get(&forty).expect("get").expect("exists");
        assert_eq!(vertex.value().expect("value"), Some(&Value::Long(-40)));
    }

    /// T1.5: Writers on disjoint things both commit.
    #[test]
    fn disjoint_writers_both_commit() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let people = instances(&keyspace, &person, 4);
        let session = keyspace.session(SessionType::Data);

        let mut first = session.transaction(TransactionType::Write).expect("tx");
        let mut second = session.transaction(TransactionType::Write).expect("tx");
        first
            .things()
            .outs(&people[0])
            .expect("outs")
            .add(ThingEdgeSchema::Has, &people[1])
            .expect("edge");
        second
            .things()
            .outs(&people[2])
            .expect("outs")
            .add(ThingEdgeSchema::Has, &people[3])
            .expect("edge");
        second.graphs().create_thing(&person).expect("thing");

        first.commit().expect("first commit");
        second.commit().expect("second commit");
    }

    /// T1.6: Deleting a thing and linking to it concurrently: the second
    /// committer fails and writes nothing.
    #[test]
    fn delete_and_link_conflict() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);

        for delete_first in [true, false] {
            let people = instances(&keyspace, &person, 2);
            let (x, y) = (&people[0], &people[1]);

            let mut deleter = session.transaction(TransactionType::Write).expect("tx");
            let mut linker = session.transaction(TransactionType::Write).expect("tx");
            assert!(deleter.things().delete(x).expect("delete"));
            linker
                .things()
                .outs(x)
                .expect("outs")
                .add(ThingEdgeSchema::Has, y)
                .expect("edge");

            let (winner, loser) = if delete_first {
                (deleter, linker)
            } else {
                (linker, deleter)
            };
            winner.commit().expect("first committer wins");
            assert!(matches!(loser.commit(), Err(GraphError::Conflict(_))));

            let mut reader = session.transaction(TransactionType::Read).expect("reader");
            let x_exists = reader.things().get(x).expect("get").is_some();
            let y_ins: Vec<Iid> = reader
                .things()
                .ins(y)
                .expect("ins")
                .get(ThingEdgeSchema::Has)
                .expect("scan")
                .collect::<Result<_, _>>()
                .expect("iids");
            if delete_first {
                assert!(!x_exists);
                assert!(y_ins.is_empty());
            } else {
                assert!(x_exists);
                assert_eq!(y_ins, vec![x.clone()]);
            }
        }
    }
}

// =============================================================================
// TIER T2: ADJACENCY SYMMETRY
// =============================================================================

mod t2_adjacency_symmetry {
    use super::*;

    fn adjacent(
        transaction: &mut trellis_core::Transaction,
        owner: &Iid,
        outgoing: bool,
    ) -> Vec<Iid> {
        let things = transaction.things();
        let edges = if outgoing {
            things.outs(owner)
        } else {
            things.ins(owner)
        }
        .expect("edges");
        edges
            .get(ThingEdgeSchema::Playing)
            .expect("scan")
            .collect::<Result<_, _>>()
            .expect("adjacent")
    }

    /// T2.1: An edge is reachable from both endpoints, before and after commit.
    #[test]
    fn edge_reachable_from_both_ends() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        let alice = transaction.graphs().create_thing(&person).expect("thing");
        let bob = transaction.graphs().create_thing(&person).expect("thing");
        transaction
            .things()
            .outs(&alice)
            .expect("outs")
            .add(ThingEdgeSchema::Playing, &bob)
            .expect("add");

        assert_eq!(adjacent(&mut transaction, &alice, true), vec![bob.clone()]);
        assert_eq!(adjacent(&mut transaction, &bob, false), vec![alice.clone()]);
        transaction.commit().expect("commit");

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        assert_eq!(adjacent(&mut reader, &alice, true), vec![bob.clone()]);
        assert_eq!(adjacent(&mut reader, &bob, false), vec![alice]);
        assert!(adjacent(&mut reader, &bob, true).is_empty());
    }

    /// T2.2: Removing from one end removes from the other, in storage too.
    #[test]
    fn removal_is_symmetric() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let people = instances(&keyspace, &person, 2);
        let session = keyspace.session(SessionType::Data);

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        transaction
            .things()
            .outs(&people[0])
            .expect("outs")
            .add(ThingEdgeSchema::Playing, &people[1])
            .expect("add");
        transaction.commit().expect("commit");

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        assert!(
            transaction
                .things()
                .ins(&people[1])
                .expect("ins")
                .remove(ThingEdgeSchema::Playing, &people[0])
                .expect("remove")
        );
        assert!(adjacent(&mut transaction, &people[0], true).is_empty());
        transaction.commit().expect("commit");

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        assert!(adjacent(&mut reader, &people[0], true).is_empty());
        assert!(adjacent(&mut reader, &people[1], false).is_empty());
    }

    /// T2.3: Type edges follow the same rule.
    #[test]
    fn type_edges_symmetric() {
        let (_dir, keyspace) = keyspace();
        let session = keyspace.session(SessionType::Schema);
        let mut transaction = session.transaction(TransactionType::Read).expect("tx");
        let thing = transaction.types().iid_of("thing").expect("label").expect("root");
        let entity = transaction.types().iid_of("entity").expect("label").expect("root");

        let subtypes: Vec<Iid> = transaction
            .types()
            .ins(&thing)
            .expect("ins")
            .get(TypeEdgeSchema::Sub)
            .expect("scan")
            .collect::<Result<_, _>>()
            .expect("subtypes");
        let supertypes: Vec<Iid> = transaction
            .types()
            .outs(&entity)
            .expect("outs")
            .get(TypeEdgeSchema::Sub)
            .expect("scan")
            .collect::<Result<_, _>>()
            .expect("supertypes");

        assert!(subtypes.contains(&entity));
        assert_eq!(supertypes, vec![thing]);
    }
}

// =============================================================================
// TIER T3: NO-DUPLICATE TRAVERSAL
// =============================================================================

mod t3_no_duplicate_traversal {
    use super::*;

    /// T3.1: Buffered and stored edges of one schema merge without repeats.
    #[test]
    fn persisted_vertex_with_buffered_edges() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let people = instances(&keyspace, &person, 3);
        let session = keyspace.session(SessionType::Data);

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        transaction
            .things()
            .outs(&people[0])
            .expect("outs")
            .add(ThingEdgeSchema::Has, &people[1])
            .expect("add");
        transaction.commit().expect("commit");

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        let newcomer = transaction.graphs().create_thing(&person).expect("thing");
        {
            let things = transaction.things();
            let mut outs = things.outs(&people[0]).expect("outs");
            outs.add(ThingEdgeSchema::Has, &newcomer).expect("buffered");
            outs.add(ThingEdgeSchema::Has, &people[1]).expect("existing");
            outs.add(ThingEdgeSchema::Has, &people[2]).expect("written through");
        }

        let outs = transaction.things().outs(&people[0]).expect("outs");
        let mut adjacent: Vec<Iid> = outs
            .get(ThingEdgeSchema::Has)
            .expect("scan")
            .collect::<Result<_, _>>()
            .expect("adjacent");
        assert_eq!(adjacent.len(), 3);
        adjacent.sort();
        adjacent.dedup();
        assert_eq!(adjacent.len(), 3);
        assert!(outs.contains(ThingEdgeSchema::Has, &newcomer).expect("contains"));
        assert!(!outs.contains(ThingEdgeSchema::Playing, &newcomer).expect("contains"));
    }

    /// T3.2: remove_all clears buffered and stored edges together.
    #[test]
    fn remove_all_clears_both_sources() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let people = instances(&keyspace, &person, 3);
        let session = keyspace.session(SessionType::Data);

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        transaction
            .things()
            .outs(&people[0])
            .expect("outs")
            .add(ThingEdgeSchema::Has, &people[1])
            .expect("add");
        transaction.commit().expect("commit");

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        let newcomer = transaction.graphs().create_thing(&person).expect("thing");
        let mut outs = transaction.things().outs(&people[0]).expect("outs");
        outs.add(ThingEdgeSchema::Has, &newcomer).expect("add");
        assert_eq!(outs.remove_all(ThingEdgeSchema::Has).expect("remove"), 2);
        assert_eq!(outs.get(ThingEdgeSchema::Has).expect("scan").count(), 0);
    }
}

// =============================================================================
// TIER T4: SCHEMA EXCLUSIVITY
// =============================================================================

mod t4_schema_exclusivity {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// T4.1: A second schema session waits for the first.
    #[test]
    fn second_schema_session_blocks() {
        let (_dir, keyspace) = keyspace();
        let first = keyspace.session(SessionType::Schema);
        let (sender, receiver) = mpsc::channel();

        let waiter = {
            let keyspace = keyspace.clone();
            thread::spawn(move || {
                let _second = keyspace.session(SessionType::Schema);
                sender.send(()).expect("send");
            })
        };

        assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());
        drop(first);
        receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("second schema session opened");
        waiter.join().expect("join");
    }

    /// T4.2: An open data transaction keeps running and commits while a
    /// schema session waits for it.
    #[test]
    fn open_data_transaction_proceeds() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let session = keyspace.session(SessionType::Data);
        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        let (sender, receiver) = mpsc::channel();

        let waiter = {
            let keyspace = keyspace.clone();
            thread::spawn(move || {
                let schema = keyspace.session(SessionType::Schema);
                sender.send(()).expect("send");
                let mut transaction = schema.transaction(TransactionType::Write).expect("tx");
                transaction
                    .types()
                    .create(TypeSchema::EntityType, "company")
                    .expect("create");
                transaction.commit().expect("commit");
            })
        };

        assert!(receiver.recv_timeout(Duration::from_millis(200)).is_err());
        let alice = transaction.graphs().create_thing(&person).expect("thing");
        transaction.commit().expect("data commit");

        receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("schema session opened after data commit");
        waiter.join().expect("join");

        let mut reader = session.transaction(TransactionType::Read).expect("reader");
        assert!(reader.things().get(&alice).expect("get").is_some());
        assert!(reader.types().get_by_label("company").expect("label").is_some());
    }

    /// T4.3: Data sessions cannot change the schema.
    #[test]
    fn data_session_cannot_define_types() {
        let (_dir, keyspace) = keyspace();
        let session = keyspace.session(SessionType::Data);
        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        assert!(matches!(
            transaction.types().create(TypeSchema::EntityType, "person"),
            Err(GraphError::SchemaWriteRequired)
        ));
    }
}

// =============================================================================
// TIER T5: COUNTER MONOTONICITY UNDER ABORT
// =============================================================================

mod t5_counter_monotonicity {
    use super::*;

    /// T5.1: Discarded creations still consume keys.
    #[test]
    fn aborted_keys_are_never_reused() {
        let (_dir, keyspace) = keyspace();
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        let before = keyspace.key_generator().peek_thing(&person);
        let session = keyspace.session(SessionType::Data);

        let discarded: Vec<Iid> = {
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            (0..3)
                .map(|_| transaction.graphs().create_thing(&person).expect("thing"))
                .collect()
        };
        assert_eq!(keyspace.key_generator().peek_thing(&person), before + 3);

        let mut transaction = session.transaction(TransactionType::Write).expect("tx");
        let kept = transaction.graphs().create_thing(&person).expect("thing");
        transaction.commit().expect("commit");
        assert!(discarded.iter().all(|iid| *iid < kept));
    }

    /// T5.2: Discarded type keys are not reissued after a restart either.
    #[test]
    fn aborted_type_keys_survive_restart() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("abort.trellis");
        let discarded = {
            let keyspace = Keyspace::create(&path).expect("create");
            let discarded = {
                let session = keyspace.session(SessionType::Schema);
                let mut transaction = session.transaction(TransactionType::Write).expect("tx");
                transaction
                    .types()
                    .create(TypeSchema::EntityType, "ghost")
                    .expect("create")
            };
            // Any later commit checkpoints the advanced counter.
            define(&keyspace, TypeSchema::RelationType, "friendship");
            discarded
        };

        let keyspace = reopen(&path);
        let person = define(&keyspace, TypeSchema::EntityType, "person");
        assert!(person > discarded);
    }
}

// =============================================================================
// TIER T6: END-TO-END
// =============================================================================

mod t6_end_to_end {
    use super::*;

    /// T6.1: Define, look up, change and observe a type across transactions.
    #[test]
    fn abstract_flag_lifecycle() {
        let (_dir, keyspace) = keyspace();
        let session = keyspace.session(SessionType::Schema);

        let person = {
            let mut transaction = session.transaction(TransactionType::Write).expect("tx");
            let person = transaction
                .types()
                .create(TypeSchema::EntityType, "person")
                .expect("create");
            transaction.commit().expect("commit");
            person
        };

        let mut writer = session.transaction(TransactionType::Write).expect("tx");
        let found = writer
            .types()
            .get_by_label("person")
            .expect("label")
            .expect("found");
        assert_eq!(found.iid(), &person);
        assert!(!found.is_abstract().expect("abstract"));
        writer
            .types()
            .get_mut(&person)
            .expect("get")
            .expect("exists")
            .set_abstract(true)
            .expect("set abstract");

        let mut concurrent = session.transaction(TransactionType::Read).expect("tx");
        let seen = concurrent
            .types()
            .get_by_label("person")
            .expect("label")
            .expect("found");
        assert!(!seen.is_abstract().expect("abstract"));

        writer.commit().expect("commit");

        let mut later = session.transaction(TransactionType::Read).expect("tx");
        let seen = later
            .types()
            .get_by_label("person")
            .expect("label")
            .expect("found");
        assert_eq!(seen.iid(), &person);
        assert!(seen.is_abstract().expect("abstract"));
    }
}
