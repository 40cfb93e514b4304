mod controller_test;
