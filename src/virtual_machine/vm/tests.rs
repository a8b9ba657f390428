use super::*;
use crate::virtual_machine::io::PortError;

const QUINE: &str = "109,1,204,-1,1001,100,1,100,1008,100,16,101,1006,101,0,99";

/// Compares the input against 8 and prints 999, 1000 or 1001.
const COMPARE_TO_EIGHT: &str = "3,21,1008,21,8,20,1005,20,22,107,8,21,20,1006,20,31,\
    1106,0,36,98,0,0,1002,21,125,20,4,20,1105,1,46,104,999,1105,1,46,1101,1000,1,20,\
    4,20,1105,1,46,98,99";

fn vm(source: &str) -> VM {
    VM::parse(source).expect("parse failed")
}

fn run_program(source: &str, input: &[i64]) -> (VM, Vec<i64>) {
    let mut vm = vm(source);
    let output = vm.run_to_halt(input).expect("vm run failed");
    (vm, output)
}

fn outputs(source: &str, input: &[i64]) -> Vec<i64> {
    run_program(source, input).1
}

fn run_expect_err(source: &str, input: &[i64]) -> (VM, VMError) {
    let mut vm = vm(source);
    let err = vm.run_to_halt(input).expect_err("expected error");
    (vm, err)
}

/// Port that refuses every output.
struct RejectingPort;

impl IoPort for RejectingPort {
    fn fetch(&mut self) -> Result<Option<i64>, PortError> {
        Ok(None)
    }

    fn put(&mut self, value: i64) -> Result<(), PortError> {
        Err(PortError::Rejected {
            value,
            reason: "read-only".to_string(),
        })
    }
}

// ==================== Arithmetic ====================

#[test]
fn add_and_multiply_position_mode() {
    let (vm, output) = run_program("1,9,10,3,2,3,11,0,99,30,40,50", &[]);
    assert!(output.is_empty());
    assert_eq!(vm.peek(0), 3500);
    assert_eq!(vm.peek(3), 70);
    assert_eq!(vm.status(), Status::Halted);
}

#[test]
fn small_programs_reach_known_final_memory() {
    let cases: [(&str, &[i64]); 4] = [
        ("1,0,0,0,99", &[2, 0, 0, 0, 99]),
        ("2,3,0,3,99", &[2, 3, 0, 6, 99]),
        ("2,4,4,5,99,0", &[2, 4, 4, 5, 99, 9801]),
        ("1,1,1,4,99,5,6,0,99", &[30, 1, 1, 4, 2, 5, 6, 0, 99]),
    ];
    for (source, expected) in cases {
        let (vm, _) = run_program(source, &[]);
        assert_eq!(vm.memory(), expected, "{source}");
    }
}

#[test]
fn immediate_mode_operands() {
    let (vm, _) = run_program("1002,4,3,4,33", &[]);
    assert_eq!(vm.peek(4), 99);
    let (vm, _) = run_program("1101,100,-1,4,0", &[]);
    assert_eq!(vm.peek(4), 99);
}

#[test]
fn large_numbers_are_64_bit() {
    assert_eq!(
        outputs("1102,34915192,34915192,7,4,7,99,0", &[]),
        vec![1_219_070_632_396_864]
    );
    assert_eq!(
        outputs("104,1125899906842624,99", &[]),
        vec![1_125_899_906_842_624]
    );
}

#[test]
fn arithmetic_wraps_on_overflow() {
    let source = format!("1101,{},1,7,4,7,99,0", i64::MAX);
    assert_eq!(outputs(&source, &[]), vec![i64::MIN]);
    let source = format!("1102,{},2,7,4,7,99,0", i64::MIN);
    assert_eq!(outputs(&source, &[]), vec![0]);
}

// ==================== Comparisons and jumps ====================

#[test]
fn equals_position_mode() {
    let source = "3,9,8,9,10,9,4,9,99,-1,8";
    assert_eq!(outputs(source, &[8]), vec![1]);
    assert_eq!(outputs(source, &[7]), vec![0]);
}

#[test]
fn less_than_position_mode() {
    let source = "3,9,7,9,10,9,4,9,99,-1,8";
    assert_eq!(outputs(source, &[5]), vec![1]);
    assert_eq!(outputs(source, &[8]), vec![0]);
}

#[test]
fn comparisons_immediate_mode() {
    assert_eq!(outputs("3,3,1108,-1,8,3,4,3,99", &[8]), vec![1]);
    assert_eq!(outputs("3,3,1108,-1,8,3,4,3,99", &[9]), vec![0]);
    assert_eq!(outputs("3,3,1107,-1,8,3,4,3,99", &[-4]), vec![1]);
    assert_eq!(outputs("3,3,1107,-1,8,3,4,3,99", &[12]), vec![0]);
}

#[test]
fn jumps_position_and_immediate_mode() {
    let position = "3,12,6,12,15,1,13,14,13,4,13,99,-1,0,1,9";
    let immediate = "3,3,1105,-1,9,1101,0,0,12,4,12,99,1";
    for source in [position, immediate] {
        assert_eq!(outputs(source, &[0]), vec![0], "{source}");
        assert_eq!(outputs(source, &[17]), vec![1], "{source}");
    }
}

#[test]
fn compare_to_eight_program() {
    assert_eq!(outputs(COMPARE_TO_EIGHT, &[3]), vec![999]);
    assert_eq!(outputs(COMPARE_TO_EIGHT, &[8]), vec![1000]);
    assert_eq!(outputs(COMPARE_TO_EIGHT, &[42]), vec![1001]);
}

// ==================== I/O and relative mode ====================

#[test]
fn echo_input() {
    assert_eq!(outputs("3,0,4,0,99", &[42]), vec![42]);
}

#[test]
fn quine_outputs_itself() {
    let expected = Program::parse(QUINE).unwrap().into_cells();
    let (vm, output) = run_program(QUINE, &[]);
    assert_eq!(output, expected);
    assert_eq!(vm.relative_base(), 16);
}

#[test]
fn relative_mode_write_target() {
    // ARB 10; IN [rb+0]; OUT [rb+0]; HALT
    let (vm, output) = run_program("109,10,203,0,204,0,99", &[-5]);
    assert_eq!(output, vec![-5]);
    assert_eq!(vm.peek(10), -5);
}

#[test]
fn relative_base_can_go_negative_before_use() {
    // ARB -5; ARB 20; OUT [rb-3] -> reads cell 12
    let source = "109,-5,109,20,204,-3,99,0,0,0,0,0,77";
    assert_eq!(outputs(source, &[]), vec![77]);
}

#[test]
fn outputs_are_pushed_in_order() {
    assert_eq!(outputs("104,1,104,2,104,3,99", &[]), vec![1, 2, 3]);
}

// ==================== Memory ====================

#[test]
fn memory_grows_on_write_past_end() {
    let (vm, output) = run_program("1101,2,3,1000,4,1000,4,999,99", &[]);
    assert_eq!(output, vec![5, 0]);
    assert_eq!(vm.peek(1000), 5);
    assert_eq!(vm.memory().len(), 1001);
}

#[test]
fn peek_past_end_reads_zero_without_growing() {
    let vm = vm("99");
    assert_eq!(vm.peek(50), 0);
    assert_eq!(vm.memory().len(), 1);
}

#[test]
fn poke_noun_and_verb_before_running() {
    // 1,N,V,0: mem[0] = mem[N] + mem[V]; 2,0,11,0: mem[0] *= mem[11]
    let mut vm = vm("1,0,0,0,2,0,11,0,99,0,0,5,30");
    vm.poke(1, 12).unwrap();
    vm.poke(2, 2).unwrap();
    vm.run_to_halt(&[]).unwrap();
    assert_eq!(vm.peek(0), (30 + 2) * 5);
}

#[test]
fn noun_verb_search_over_clones() {
    let template = vm("1,0,0,0,2,0,11,0,99,0,0,5,30");
    let mut found = None;
    'search: for noun in 0..=12 {
        for verb in 0..=12 {
            let mut attempt = template.clone();
            attempt.poke(1, noun).unwrap();
            attempt.poke(2, verb).unwrap();
            attempt.run_to_halt(&[]).unwrap();
            if attempt.peek(0) == 175 {
                found = Some((noun, verb));
                break 'search;
            }
        }
    }
    // 175 = (5 + 30) * 5: noun 11 reads the 5, verb 12 reads the 30.
    assert_eq!(found, Some((11, 12)));
    let (noun, verb) = found.unwrap();
    let mut check = template.clone();
    check.poke(1, noun).unwrap();
    check.poke(2, verb).unwrap();
    check.run_to_halt(&[]).unwrap();
    assert_eq!(check.peek(0), 175);
    assert_eq!(template.peek(1), 0);
}

// ==================== Suspension and resumption ====================

#[test]
fn awaiting_input_does_not_advance_ip() {
    let mut vm = vm("3,0,4,0,99");
    let mut port = QueuePort::new();
    assert_eq!(vm.run(&mut port).unwrap(), Status::AwaitingInput);
    assert_eq!(vm.ip(), 0);
    assert_eq!(vm.steps(), 0);
    assert_eq!(vm.run(&mut port).unwrap(), Status::AwaitingInput);

    port.push(7);
    assert_eq!(vm.run(&mut port).unwrap(), Status::Halted);
    assert_eq!(port.drain_output(), vec![7]);
    assert_eq!(vm.steps(), 3);
}

#[test]
fn yield_resumes_after_the_output() {
    let mut vm = vm("104,1,104,2,99");
    let mut port = QueuePort::interactive();

    assert_eq!(vm.run(&mut port).unwrap(), Status::Yielded);
    assert_eq!(vm.ip(), 2);
    assert_eq!(port.drain_output(), vec![1]);

    assert_eq!(vm.run(&mut port).unwrap(), Status::Yielded);
    assert_eq!(port.drain_output(), vec![2]);

    assert_eq!(vm.run(&mut port).unwrap(), Status::Halted);
    assert!(port.output().is_empty());
}

#[test]
fn resumed_run_matches_uninterrupted_run() {
    let input = [5, 3];
    // Sums two inputs and prints the result and both operands.
    let source = "3,20,3,21,1,20,21,22,4,22,4,20,4,21,99";

    let mut straight = vm(source);
    let straight_out = straight.run_to_halt(&input).unwrap();

    let mut resumed = vm(source);
    let mut port = QueuePort::new();
    assert_eq!(resumed.run(&mut port).unwrap(), Status::AwaitingInput);
    port.push(input[0]);
    assert_eq!(resumed.run(&mut port).unwrap(), Status::AwaitingInput);
    port.push(input[1]);
    assert_eq!(resumed.run(&mut port).unwrap(), Status::Halted);

    assert_eq!(port.drain_output(), straight_out);
    assert_eq!(resumed.memory(), straight.memory());
    assert_eq!(resumed.ip(), straight.ip());
    assert_eq!(resumed.steps(), straight.steps());
}

#[test]
fn run_on_halted_vm_is_a_no_op() {
    let mut vm = vm("104,9,99");
    assert_eq!(vm.run_to_halt(&[]).unwrap(), vec![9]);
    let steps = vm.steps();
    let mut port = QueuePort::new();
    assert_eq!(vm.run(&mut port).unwrap(), Status::Halted);
    assert!(port.output().is_empty());
    assert_eq!(vm.steps(), steps);
}

#[test]
fn run_with_queue_reports_blocked_vm() {
    let mut vm = vm("3,0,3,1,4,0,4,1,99");
    let (status, out) = vm.run_with_queue([4]).unwrap();
    assert_eq!(status, Status::AwaitingInput);
    assert!(out.is_empty());
    let (status, out) = vm.run_with_queue([6]).unwrap();
    assert_eq!(status, Status::Halted);
    assert_eq!(out, vec![4, 6]);
}

#[test]
fn step_executes_one_instruction() {
    let mut vm = vm("1101,1,2,0,99");
    let mut port = QueuePort::new();
    assert_eq!(vm.step(&mut port).unwrap(), Status::Running);
    assert_eq!(vm.ip(), 4);
    assert_eq!(vm.peek(0), 3);
    assert_eq!(vm.step(&mut port).unwrap(), Status::Halted);
}

// ==================== Clone and determinism ====================

#[test]
fn clone_is_isolated_from_source() {
    let mut source = vm("3,0,4,0,109,5,99");
    let mut port = QueuePort::new();
    assert_eq!(source.run(&mut port).unwrap(), Status::AwaitingInput);

    let mut fork = source.clone();
    fork.poke(500, 1).unwrap();
    assert_eq!(fork.run_with_queue([8]).unwrap().0, Status::Halted);

    assert_eq!(source.ip(), 0);
    assert_eq!(source.relative_base(), 0);
    assert_eq!(source.status(), Status::AwaitingInput);
    assert_eq!(source.memory(), &[3, 0, 4, 0, 109, 5, 99]);

    port.push(11);
    assert_eq!(source.run(&mut port).unwrap(), Status::Halted);
    assert_eq!(port.drain_output(), vec![11]);
    assert_eq!(fork.relative_base(), 5);
}

#[test]
fn fresh_runs_are_deterministic() {
    for input in [3, 8, 20] {
        let (a_vm, a_out) = run_program(COMPARE_TO_EIGHT, &[input]);
        let (b_vm, b_out) = run_program(COMPARE_TO_EIGHT, &[input]);
        assert_eq!(a_out, b_out);
        assert_eq!(a_vm.memory(), b_vm.memory());
        assert_eq!(a_vm.steps(), b_vm.steps());
    }
}

// ==================== Errors ====================

#[test]
fn unknown_opcode_errors() {
    let (vm, err) = run_expect_err("1101,1,1,0,42", &[]);
    assert_eq!(err, VMError::InvalidOpcode { opcode: 42, ip: 4 });
    assert_eq!(vm.status(), Status::Errored);
    assert_eq!(vm.fault(), Some(&err));
}

#[test]
fn running_off_the_end_reads_opcode_zero() {
    let (_, err) = run_expect_err("1101,1,1,5", &[]);
    assert_eq!(err, VMError::InvalidOpcode { opcode: 0, ip: 4 });
}

#[test]
fn invalid_parameter_mode_errors() {
    let (_, err) = run_expect_err("304,0,99", &[]);
    assert_eq!(
        err,
        VMError::InvalidParameterMode {
            mode: 3,
            param: 1,
            ip: 0
        }
    );
}

#[test]
fn negative_position_address_errors() {
    let (_, err) = run_expect_err("4,-1,99", &[]);
    assert_eq!(err, VMError::NegativeAddress { address: -1, ip: 0 });
}

#[test]
fn negative_relative_address_errors() {
    let (_, err) = run_expect_err("109,-3,204,1,99", &[]);
    assert_eq!(err, VMError::NegativeAddress { address: -2, ip: 2 });
}

#[test]
fn negative_jump_target_errors() {
    let (_, err) = run_expect_err("1105,1,-4,99", &[]);
    assert_eq!(err, VMError::NegativeAddress { address: -4, ip: 0 });
}

#[test]
fn relative_address_overflow_errors() {
    let source = format!("109,{},204,1,99", i64::MAX);
    let (_, err) = run_expect_err(&source, &[]);
    assert_eq!(
        err,
        VMError::AddressOverflow {
            base: i64::MAX,
            offset: 1,
            ip: 2
        }
    );
}

#[test]
fn immediate_write_target_errors() {
    let (vm, err) = run_expect_err("11101,1,1,0,99", &[]);
    assert_eq!(
        err,
        VMError::ImmediateWrite {
            instruction: "ADD",
            param: 3,
            ip: 0
        }
    );
    assert_eq!(vm.peek(0), 11101);
}

#[test]
fn immediate_input_target_errors_without_consuming_input() {
    let mut vm = vm("103,0,99");
    let mut port = QueuePort::with_input([5]);
    let err = vm.run(&mut port).unwrap_err();
    assert!(matches!(err, VMError::ImmediateWrite { instruction: "IN", param: 1, .. }));
    assert_eq!(port.pending_input(), 1);
}

#[test]
fn exhausted_buffer_input_is_fatal() {
    let (vm, err) = run_expect_err("3,0,3,1,99", &[1]);
    assert_eq!(err, VMError::Port(PortError::InputExhausted));
    assert_eq!(vm.ip(), 2);
}

#[test]
fn rejected_output_errors() {
    let mut vm = vm("104,3,99");
    let err = vm.run(RejectingPort).unwrap_err();
    assert!(matches!(err, VMError::Port(PortError::Rejected { value: 3, .. })));
    assert_eq!(vm.ip(), 0);
}

#[test]
fn run_after_error_reports_fault() {
    let (mut vm, err) = run_expect_err("42", &[]);
    let again = vm.run(QueuePort::new()).unwrap_err();
    assert_eq!(again, VMError::Faulted(Box::new(err)));
    assert_eq!(vm.status(), Status::Errored);
}

#[test]
fn step_limit_stops_infinite_loop() {
    // JT 1, 0: jump to itself forever.
    let mut vm = vm("1105,1,0").with_step_limit(100);
    let err = vm.run(QueuePort::new()).unwrap_err();
    assert_eq!(err, VMError::StepLimitExceeded { limit: 100 });
    assert_eq!(vm.steps(), 100);
    assert_eq!(vm.step_limit(), Some(100));
}

#[test]
fn step_limit_counts_across_runs() {
    let mut vm = vm("3,0,3,0,3,0,99").with_step_limit(2);
    let mut port = QueuePort::with_input([1]);
    assert_eq!(vm.run(&mut port).unwrap(), Status::AwaitingInput);
    port.push(3);
    assert_eq!(
        vm.run(&mut port).unwrap_err(),
        VMError::StepLimitExceeded { limit: 2 }
    );
}

#[test]
fn memory_limit_stops_wild_writes() {
    let mut vm = vm("1101,1,1,100000,99").with_memory_limit(1_000);
    assert_eq!(vm.memory_limit(), 1_000);
    assert_eq!(
        vm.run_to_halt(&[]).unwrap_err(),
        VMError::MemoryLimitExceeded {
            address: 100_000,
            limit: 1_000
        }
    );
}

#[test]
fn default_memory_limit_applies() {
    assert_eq!(vm("99").memory_limit(), DEFAULT_MEMORY_LIMIT);
}

#[test]
fn memory_limit_can_be_lifted() {
    let mut vm = vm("1101,2,3,100000,4,100000,99").with_memory_limit(usize::MAX);
    assert_eq!(vm.memory_limit(), usize::MAX);
    assert_eq!(vm.run_to_halt(&[]).unwrap(), vec![5]);
}

#[test]
fn status_terminal_states() {
    assert!(Status::Halted.is_terminal());
    assert!(Status::Errored.is_terminal());
    assert!(!Status::AwaitingInput.is_terminal());
    assert!(!Status::Yielded.is_terminal());
    assert_eq!(Status::AwaitingInput.to_string(), "awaiting input");
}
