// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Ensure that all version of each macro can be used

use std::rc::Rc;

use pimfab_track::entity::{Entity, toplevel};
use pimfab_track::{Id, connect, debug, error, info, test_helpers, test_init, trace, warn};

macro_rules! build_with_entity {
    ($name:ident, $macro:ident, $slvl:expr) => (
        #[test]
        fn $name() {
            let (test_tracker, tracker) = test_init!(100);

            let top = toplevel(&tracker, "top");
            test_helpers::check_and_clear(&test_tracker, &["0: created 100, top"]);
            assert_eq!(top.id, Id(100));

            $macro!(top ; "Loc with no args");
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl, ": Loc with no args")]);

            $macro!(top ; "Loc with {} argument", 1);
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl, ": Loc with 1 argument")]);

            $macro!(top ; "Loc with {}, {} arguments", 1, 1 + 1);
            test_helpers::check_and_clear(&test_tracker, &[concat!("100:", $slvl,": Loc with 1, 2 arguments")]);

            drop(top);
            test_helpers::check_and_clear(&test_tracker, &["0: destroyed 100"]);
        }
    );
}

build_with_entity!(trace_with_entity, trace, "TRACE");
build_with_entity!(info_with_entity, info, "INFO");
build_with_entity!(debug_with_entity, debug, "DEBUG");
build_with_entity!(warn_with_entity, warn, "WARN");
build_with_entity!(error_with_entity, error, "ERROR");

#[test]
fn create_child_and_connect() {
    let (test_tracker, tracker) = test_init!(10);

    let top = toplevel(&tracker, "top");
    let cpu = Rc::new(Entity::new(&top, "cpu0"));
    let l1 = Rc::new(Entity::new(&top, "l1_0"));
    test_helpers::check_and_clear(
        &test_tracker,
        &[
            "0: created 10, top",
            "10: created 11, top::cpu0",
            "10: created 12, top::l1_0",
        ],
    );

    connect!(cpu ; l1);
    test_helpers::check_and_clear(&test_tracker, &["11: connect to 12"]);

    drop(l1);
    test_helpers::check_and_clear(&test_tracker, &["10: destroyed 12"]);
}
